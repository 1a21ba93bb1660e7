//! Decoding containers with lazy property reads.

use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};

use ambry_core::collections::HashMap;
use parking_lot::Mutex;

use super::wire::{CountingReader, read_len, read_prefixed_string, read_utf8};
use super::{DATA_PROPERTY, LOADER_PROPERTY};
use crate::error::{AssetError, AssetResult};

/// A byte source that can also seek.
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

/// The raw bytes of one compiled asset.
pub enum AssetStream {
    /// A source that supports random access (files, memory).
    Seekable(Box<dyn SeekRead>),
    /// A source that can only be read front to back (pipes, sockets).
    Forward(Box<dyn Read + Send>),
}

impl AssetStream {
    /// Wrap a seekable source.
    pub fn seekable(reader: impl Read + Seek + Send + 'static) -> Self {
        AssetStream::Seekable(Box::new(reader))
    }

    /// Wrap a forward-only source.
    pub fn forward(reader: impl Read + Send + 'static) -> Self {
        AssetStream::Forward(Box::new(reader))
    }

    /// Serve an in-memory buffer as a seekable source.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::seekable(Cursor::new(bytes))
    }

    /// Returns `true` if the source supports random access.
    pub fn is_seekable(&self) -> bool {
        matches!(self, AssetStream::Seekable(_))
    }
}

impl fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetStream::Seekable(_) => f.write_str("AssetStream::Seekable"),
            AssetStream::Forward(_) => f.write_str("AssetStream::Forward"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    length: usize,
}

/// Accumulates the bytes of a forward-only stream, keyed by absolute position.
///
/// `start` is the absolute position of `buffered[0]`; the buffer always ends at the
/// reader's current position. Fetches may arrive in any order, but never below
/// `start` and never past what the stream can still produce.
pub(crate) struct ForwardBuffer<R> {
    reader: CountingReader<R>,
    start: u64,
    buffered: Vec<u8>,
}

impl<R: Read> ForwardBuffer<R> {
    pub(crate) fn new(reader: CountingReader<R>) -> Self {
        let start = reader.position();
        Self {
            reader,
            start,
            buffered: Vec::new(),
        }
    }

    pub(crate) fn fetch(&mut self, offset: u64, length: usize) -> AssetResult<&[u8]> {
        if offset < self.start {
            return Err(AssetError::decode(format!(
                "offset {} precedes the payload at {}",
                offset, self.start
            )));
        }

        let end = offset + length as u64;
        let cursor = self.reader.position();
        if end > cursor {
            // Grow by what the stream yields, never by the declared length.
            let wanted = end - cursor;
            let got = (&mut self.reader)
                .take(wanted)
                .read_to_end(&mut self.buffered)?;
            if (got as u64) < wanted {
                return Err(AssetError::decode("unexpected end of stream"));
            }
        }

        let from = (offset - self.start) as usize;
        Ok(&self.buffered[from..from + length])
    }

    #[cfg(test)]
    pub(crate) fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}

enum PayloadSource {
    Seekable {
        stream: Box<dyn SeekRead>,
        base: u64,
    },
    Forward(ForwardBuffer<Box<dyn Read + Send>>),
}

impl PayloadSource {
    fn read(&mut self, entry: IndexEntry) -> AssetResult<Vec<u8>> {
        match self {
            PayloadSource::Seekable { stream, base } => {
                stream.seek(SeekFrom::Start(*base + entry.offset))?;
                let mut bytes = Vec::new();
                let got = Read::take(&mut **stream, entry.length as u64).read_to_end(&mut bytes)?;
                if got < entry.length {
                    return Err(AssetError::decode(format!(
                        "property needs {} bytes, stream has {}",
                        entry.length, got
                    )));
                }
                Ok(bytes)
            }
            PayloadSource::Forward(buffer) => {
                buffer.fetch(entry.offset, entry.length).map(<[u8]>::to_vec)
            }
        }
    }
}

/// A decoded container whose property bytes are read on demand.
///
/// Only the dependency list and the property index are held in memory. Reads are
/// serialized through an internal lock, so a container can be shared across threads.
pub struct ReadableContainer {
    dependencies: Vec<String>,
    index: Option<HashMap<String, IndexEntry>>,
    payload: Option<Mutex<PayloadSource>>,
}

impl fmt::Debug for ReadableContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableContainer")
            .field("dependencies", &self.dependencies)
            .field("properties", &self.index.as_ref().map(|index| index.len()))
            .finish()
    }
}

fn read_dependencies<R: Read>(r: &mut R) -> AssetResult<Vec<String>> {
    let count = read_len(r, "dependency count")?;
    // Capacity is capped so a corrupt count cannot trigger a huge allocation.
    let mut dependencies = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        dependencies.push(read_prefixed_string(r)?);
    }
    Ok(dependencies)
}

/// Read the index; `index_start` is the position of its first byte relative to the
/// container start.
fn read_index<R: Read>(r: &mut R, index_start: u64) -> AssetResult<HashMap<String, IndexEntry>> {
    let count = read_len(r, "property count")?;
    let mut index = HashMap::with_capacity(count.min(1024));
    let mut index_end = index_start + 4;

    for _ in 0..count {
        let name_len = read_len(r, "property name length")?;
        let name = read_utf8(r, name_len)?;
        let offset = read_len(r, "property offset")? as u64;
        let length = read_len(r, "property length")?;
        index_end += 12 + name_len as u64;

        if index.insert(name.clone(), IndexEntry { offset, length }).is_some() {
            return Err(AssetError::decode(format!("duplicate property '{}'", name)));
        }
    }

    if let Some((name, entry)) = index.iter().find(|(_, e)| e.offset < index_end) {
        return Err(AssetError::decode(format!(
            "property '{}' at offset {} overlaps the index ending at {}",
            name, entry.offset, index_end
        )));
    }

    Ok(index)
}

impl ReadableContainer {
    /// Decode a container from a stream.
    ///
    /// With `dependencies_only`, only the dependency list is read and the stream is
    /// dropped; property reads then fail with [`AssetError::DependenciesOnly`].
    pub fn from_stream(stream: AssetStream, dependencies_only: bool) -> AssetResult<Self> {
        match stream {
            AssetStream::Seekable(mut stream) => {
                let base = stream.stream_position()?;
                let dependencies = read_dependencies(&mut stream)?;
                if dependencies_only {
                    return Ok(Self::dependencies_only(dependencies));
                }

                let index_start = stream.stream_position()? - base;
                let index = read_index(&mut stream, index_start)?;
                Ok(Self {
                    dependencies,
                    index: Some(index),
                    payload: Some(Mutex::new(PayloadSource::Seekable { stream, base })),
                })
            }
            AssetStream::Forward(stream) => {
                let mut reader = CountingReader::new(stream);
                let dependencies = read_dependencies(&mut reader)?;
                if dependencies_only {
                    return Ok(Self::dependencies_only(dependencies));
                }

                let index_start = reader.position();
                let index = read_index(&mut reader, index_start)?;
                Ok(Self {
                    dependencies,
                    index: Some(index),
                    payload: Some(Mutex::new(PayloadSource::Forward(ForwardBuffer::new(
                        reader,
                    )))),
                })
            }
        }
    }

    /// Decode a container held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> AssetResult<Self> {
        Self::from_stream(AssetStream::from_bytes(bytes), false)
    }

    fn dependencies_only(dependencies: Vec<String>) -> Self {
        Self {
            dependencies,
            index: None,
            payload: None,
        }
    }

    /// The dependency asset names, in the order they were written.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns `true` if the container was opened without its property index.
    pub fn is_dependencies_only(&self) -> bool {
        self.index.is_none()
    }

    /// Returns `true` if the index has an entry named `property`.
    pub fn has_property(&self, property: &str) -> bool {
        self.index
            .as_ref()
            .is_some_and(|index| index.contains_key(property))
    }

    /// Property names in no particular order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.index
            .iter()
            .flat_map(|index| index.keys().map(String::as_str))
    }

    /// Read the bytes of one property.
    pub fn get_byte_array(&self, property: &str) -> AssetResult<Vec<u8>> {
        let (Some(index), Some(payload)) = (&self.index, &self.payload) else {
            return Err(AssetError::DependenciesOnly);
        };
        let entry = index
            .get(property)
            .copied()
            .ok_or_else(|| AssetError::MissingProperty {
                property: property.to_string(),
            })?;
        payload.lock().read(entry)
    }

    /// Read a property as UTF-8 text.
    pub fn get_string(&self, property: &str) -> AssetResult<String> {
        String::from_utf8(self.get_byte_array(property)?).map_err(|e| {
            AssetError::decode(format!("property '{}' is not UTF-8: {}", property, e))
        })
    }

    /// The tag of the loader this container was compiled for.
    pub fn loader(&self) -> AssetResult<String> {
        self.get_string(LOADER_PROPERTY)
    }

    /// Read the conventional primary payload.
    pub fn data(&self) -> AssetResult<Vec<u8>> {
        self.get_byte_array(DATA_PROPERTY)
    }
}
