use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

/// Raw bytes behind a located asset. Opening may happen more than once, e.g. when a loader
/// needs to peek at a header first.
pub trait AssetSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>>;

    /// in case of a caching implementation, this may need to clone the whole buffer!
    fn read_owned(&self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Human readable origin, for logging.
    fn describe(&self) -> String;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl AssetSource for FileSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct BytesSource {
    origin: String,
    bytes: Arc<[u8]>,
}

impl BytesSource {
    pub fn new(origin: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self {
            origin: origin.into(),
            bytes,
        }
    }
}

impl AssetSource for BytesSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(&self.bytes[..])))
    }

    fn read_owned(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }

    fn describe(&self) -> String {
        self.origin.clone()
    }
}

/// Wraps a caller supplied reader. It can only be opened once.
pub struct ReaderSource {
    reader: RefCell<Option<Box<dyn Read>>>,
}

impl ReaderSource {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self {
            reader: RefCell::new(Some(reader)),
        }
    }
}

impl AssetSource for ReaderSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        self.reader.borrow_mut().take().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "the stream has already been consumed",
            )
        })
    }

    fn describe(&self) -> String {
        "<stream>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_source_is_single_use() {
        let source = ReaderSource::new(Box::new(Cursor::new(b"hello".to_vec())));
        assert_eq!(source.read_owned().unwrap(), b"hello");
        assert!(source.open().is_err());
    }

    #[test]
    fn bytes_source_reopens() {
        let source = BytesSource::new("memory:greeting", Arc::from(&b"hi"[..]));
        assert_eq!(source.read_owned().unwrap(), b"hi");

        let mut text = String::new();
        source.open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "hi");
    }
}
