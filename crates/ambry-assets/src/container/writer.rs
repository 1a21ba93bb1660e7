//! Building and encoding containers.

use std::io::Write;

use indexmap::IndexMap;

use super::wire::{prefixed_string_len, to_i32, write_i32, write_prefixed_string};
use super::{DATA_PROPERTY, LOADER_PROPERTY};
use crate::error::{AssetError, AssetResult};

/// A container being assembled, typically by an asset compiler.
///
/// Properties keep their insertion order, which is also the order of the encoded
/// index and payload.
///
/// # Example
///
/// ```
/// use ambry_assets::container::{ReadableContainer, WritableContainer};
///
/// let mut container = WritableContainer::new();
/// container.set_loader("text");
/// container.set_byte_array("Data", b"hello".to_vec());
/// container.add_dependency("font.Default");
///
/// let bytes = container.to_bytes().unwrap();
/// let read = ReadableContainer::from_bytes(bytes).unwrap();
/// assert_eq!(read.get_byte_array("Data").unwrap(), b"hello");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritableContainer {
    values: IndexMap<String, Vec<u8>>,
    dependencies: Vec<String>,
}

impl WritableContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value under the same name.
    pub fn set_byte_array(&mut self, property: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.values.insert(property.into(), value.into());
    }

    /// Get a property that was previously set.
    pub fn get_byte_array(&self, property: &str) -> AssetResult<&[u8]> {
        self.values
            .get(property)
            .map(Vec::as_slice)
            .ok_or_else(|| AssetError::MissingProperty {
                property: property.to_string(),
            })
    }

    /// Set a UTF-8 string property.
    pub fn set_string(&mut self, property: impl Into<String>, value: &str) {
        self.set_byte_array(property, value.as_bytes().to_vec());
    }

    /// Declare which loader understands this container.
    pub fn set_loader(&mut self, tag: &str) {
        self.set_string(LOADER_PROPERTY, tag);
    }

    /// Set the conventional primary payload.
    pub fn set_data(&mut self, value: impl Into<Vec<u8>>) {
        self.set_byte_array(DATA_PROPERTY, value);
    }

    /// Record that this asset depends on another asset.
    ///
    /// Duplicates are kept; order is preserved.
    pub fn add_dependency(&mut self, asset_name: impl Into<String>) {
        self.dependencies.push(asset_name.into());
    }

    /// The recorded dependencies, in insertion order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Property names, in encoding order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no properties have been set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn header_len(&self) -> usize {
        4 + self
            .dependencies
            .iter()
            .map(|d| prefixed_string_len(d))
            .sum::<usize>()
    }

    /// Encode the index. With `payload_start == None` every offset is a placeholder.
    fn write_index<W: Write>(&self, w: &mut W, payload_start: Option<usize>) -> AssetResult<()> {
        write_i32(w, to_i32(self.values.len(), "property count")?)?;

        let mut offset = payload_start.unwrap_or(0);
        for (name, value) in &self.values {
            write_i32(w, to_i32(name.len(), "property name length")?)?;
            w.write_all(name.as_bytes())?;
            match payload_start {
                Some(_) => write_i32(w, to_i32(offset, "property offset")?)?,
                None => write_i32(w, 0)?,
            }
            write_i32(w, to_i32(value.len(), "property length")?)?;
            offset += value.len();
        }
        Ok(())
    }

    /// Encode the container into `w` without seeking.
    ///
    /// The index is encoded once into a scratch buffer to learn its size, then again
    /// with real offsets, then the payload follows.
    pub fn write_to<W: Write>(&self, mut w: W) -> AssetResult<()> {
        let mut scratch = Vec::new();
        self.write_index(&mut scratch, None)?;
        let index_len = scratch.len();

        write_i32(&mut w, to_i32(self.dependencies.len(), "dependency count")?)?;
        for dependency in &self.dependencies {
            write_prefixed_string(&mut w, dependency)?;
        }

        self.write_index(&mut w, Some(self.header_len() + index_len))?;

        for value in self.values.values() {
            w.write_all(value)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Encode the container into a new buffer.
    pub fn to_bytes(&self) -> AssetResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }
}
