//! Lockers for water column data
use crate::error::{Error, Result};
use crate::gwf;
use crate::model::{Ping, RecordLocation};
use binrw::io::BufReader;
use log::debug;
use std::collections::{btree_map, BTreeMap};
use std::fs::{read_dir, File};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use std::sync::mpsc;
use std::thread;

/// Ping time and ping number
pub type LockerKey = (OffsetDateTime, u32);
/// The GWF file and the record's place in it
pub type LockerValue = (PathBuf, RecordLocation);

/// A directory of GWF files with an in-memory index
///
/// A `Locker` contains a [`BTreeMap`] that maps the time and number of
/// every ping to the file and byte range holding it, so a single ping can
/// be decoded without scanning its file. Because keys are ordered by time
/// first, time-window queries with [`BTreeMap::range`] are fast.
pub struct Locker {
    path: PathBuf,
    tree: BTreeMap<LockerKey, LockerValue>,
}

impl Locker {
    /// Open a locker at the given path
    ///
    /// This reads every `.gwf` file in the directory and creates an
    /// entry for each ping. This can take a while.
    ///
    /// # Errors
    ///
    /// This function returns an error when the directory cannot be read or
    /// any ping fails to decode.
    pub fn open<P>(path: P) -> Result<Self>
    where
        PathBuf: From<P>,
    {
        let tree = BTreeMap::new();
        let path = PathBuf::from(path);

        let mut locker = Locker { path, tree };

        locker.build_index()?;

        Ok(locker)
    }

    /// Scan the `Locker` directory to build the index
    ///
    /// This will clear the current index and rescan all of the files in
    /// the directory.
    pub fn build_index(&mut self) -> Result<()> {
        self.tree.clear();

        let mut files = Vec::new();
        for entry in read_dir(&self.path)? {
            let path = entry?.path();
            if is_gwf(&path) {
                files.push(path);
            }
        }

        // One thread per file, all feeding the same channel
        let (tx, rx) = mpsc::channel();

        let handles: Vec<_> = files
            .into_iter()
            .map(|filepath| {
                let tx1 = tx.clone();
                thread::spawn(move || -> Result<()> {
                    let reader = BufReader::new(File::open(&filepath)?);
                    for ping in gwf::File::new(reader)? {
                        let ping = ping?;
                        let location = ping.location.ok_or_else(|| {
                            Error::InvalidFrame("ping read without a location".to_string())
                        })?;
                        let key = (ping.timestamp, ping.ping_number);
                        // The receiver only hangs up once every sender is gone
                        if tx1.send((key, (filepath.clone(), location))).is_err() {
                            break;
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        // Explicitly drop the Sender to close the channel
        drop(tx);

        for (key, value) in rx {
            self.tree.insert(key, value);
        }

        for handle in handles {
            handle.join().map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "Index thread panicked",
                ))
            })??;
        }

        debug!(
            "Indexed {} pings in {}",
            self.tree.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Return a reference to the path of the locker
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a reference to the underlying [`BTreeMap`]
    pub fn tree(&self) -> &BTreeMap<LockerKey, LockerValue> {
        &self.tree
    }

    /// Get an iterator over the entries of the locker, sorted by key
    pub fn iter(&self) -> Iter {
        let iter = self.tree.iter();
        Iter { iter }
    }

    /// Get the Ping identified by the key
    ///
    /// # Errors
    ///
    /// This method returns an error if the key is not found in the index tree or
    /// if there is an error reading the record from the file.
    pub fn get(&self, key: &LockerKey) -> Result<Ping> {
        let (path, location) = self.tree.get(key).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Key not found")
        })?;
        let mut f = BufReader::new(File::open(path)?);
        gwf::read_at(&mut f, location.offset)
    }
}

fn is_gwf(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("gwf"))
}

/// An iterator over the entries of the locker
///
/// This should be created by calling `iter` on a `Locker`.
pub struct Iter<'a> {
    iter: btree_map::Iter<'a, LockerKey, LockerValue>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a LockerKey, &'a LockerValue);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{Beam, SampleFormat};
    use time::Duration;

    fn ping(n: u32) -> Ping {
        Ping::new(
            n,
            OffsetDateTime::UNIX_EPOCH + Duration::seconds(i64::from(n)),
            SampleFormat::U8,
            SampleFormat::U8,
            vec![n as u8],
            vec![Beam::new(vec![1, 2, 3], vec![], vec![])],
        )
    }

    #[test]
    fn indexes_every_gwf_file() {
        let dir = tempfile::tempdir().unwrap();
        gwf::write(dir.path().join("a.gwf"), (0..3).map(ping)).unwrap();
        gwf::write(dir.path().join("b.GWF"), (3..5).map(ping)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not a gwf file").unwrap();

        let locker = Locker::open(dir.path()).unwrap();
        assert_eq!(locker.iter().len(), 5);
        let numbers: Vec<u32> = locker.iter().map(|(k, _)| k.1).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn get_decodes_one_record() {
        let dir = tempfile::tempdir().unwrap();
        gwf::write(dir.path().join("a.gwf"), (10..14).map(ping)).unwrap();
        let locker = Locker::open(dir.path()).unwrap();

        let key = (OffsetDateTime::UNIX_EPOCH + Duration::seconds(12), 12);
        let p = locker.get(&key).unwrap();
        assert_eq!(p.ping_number, 12);
        assert_eq!(p.generic_data, vec![12]);
        assert_eq!(p.location, Some(locker.tree()[&key].1));

        let missing = (OffsetDateTime::UNIX_EPOCH, 99);
        assert!(locker.get(&missing).is_err());
    }

    #[test]
    fn range_by_time() {
        let dir = tempfile::tempdir().unwrap();
        gwf::write(dir.path().join("a.gwf"), (0..10).map(ping)).unwrap();
        let locker = Locker::open(dir.path()).unwrap();
        let start = (OffsetDateTime::UNIX_EPOCH + Duration::seconds(3), 0);
        let end = (OffsetDateTime::UNIX_EPOCH + Duration::seconds(6), 0);
        assert_eq!(locker.tree().range(start..end).count(), 3);
    }
}
