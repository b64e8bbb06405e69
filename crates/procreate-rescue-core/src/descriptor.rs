//! Reading and patching the project name stored in `Document.archive`.
//!
//! Procreate writes the descriptor with `NSKeyedArchiver`: a binary property
//! list whose `$objects` array holds every archived value, with the document
//! object referencing its `name` string through a UID. Index 0 of `$objects`
//! is the `$null` sentinel, so a UID of 0 means "no name".

use crate::error::{Error, Result};
use plist::{Dictionary, Uid, Value};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;

const NAME_KEY: &str = "name";
const OBJECTS_KEY: &str = "$objects";
const TOP_KEY: &str = "$top";
const ROOT_KEY: &str = "root";
const DEFAULT_ROOT_INDEX: usize = 1;

/// Return the stored project name, or `None` when the name is absent, empty,
/// or the descriptor cannot be parsed.
pub fn read_name(descriptor_path: &Path) -> Option<String> {
    let bytes = match fs::read(descriptor_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Cannot read {}: {}", descriptor_path.display(), e);
            return None;
        }
    };
    match Descriptor::from_bytes(&bytes) {
        Ok(descriptor) => descriptor.name(),
        Err(e) => {
            debug!("Cannot parse {}: {}", descriptor_path.display(), e);
            None
        }
    }
}

/// Replace the project name in the descriptor file at `descriptor_path`,
/// leaving every other value untouched. The file is replaced atomically.
pub fn write_name(descriptor_path: &Path, new_name: &str) -> Result<()> {
    let bytes = fs::read(descriptor_path)?;
    let mut descriptor = Descriptor::from_bytes(&bytes)
        .map_err(|e| Error::DescriptorWrite(format!("cannot parse descriptor: {}", e)))?;
    descriptor.set_name(new_name)?;
    let patched = descriptor.to_bytes()?;

    let dir = descriptor_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".Document.archive")
        .tempfile_in(dir)?;
    tmp.write_all(&patched)?;
    tmp.as_file().sync_all()?;
    tmp.persist(descriptor_path)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    root: Value,
}

impl Descriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let root = Value::from_reader(Cursor::new(bytes))
            .map_err(|e| Error::DescriptorUnreadable(e.to_string()))?;
        if root.as_dictionary().is_none() {
            return Err(Error::DescriptorUnreadable(
                "top-level value is not a dictionary".to_string(),
            ));
        }
        Ok(Self { root })
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Serialize back to the binary (`bplist00`) encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.root.to_writer_binary(&mut buf)?;
        Ok(buf)
    }

    pub fn is_keyed_archive(&self) -> bool {
        self.dictionary()
            .map(|dict| dict.get(OBJECTS_KEY).and_then(Value::as_array).is_some())
            .unwrap_or(false)
    }

    pub fn name(&self) -> Option<String> {
        let dict = self.dictionary()?;
        let name = match dict.get(OBJECTS_KEY).and_then(Value::as_array) {
            Some(objects) => {
                let document = objects.get(root_index(dict))?.as_dictionary()?;
                let uid = document.get(NAME_KEY)?.as_uid()?.get() as usize;
                if uid == 0 {
                    return None;
                }
                objects.get(uid)?.as_string()?
            }
            None => dict.get(NAME_KEY)?.as_string()?,
        };
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    /// Set the project name. Only the name changes: a string object shared
    /// with other references is left alone and a new one is appended instead.
    pub fn set_name(&mut self, new_name: &str) -> Result<()> {
        let dict = self
            .root
            .as_dictionary_mut()
            .ok_or_else(|| Error::DescriptorWrite("top-level value is not a dictionary".into()))?;
        let root_idx = root_index(dict);

        if !dict.contains_key(OBJECTS_KEY) {
            dict.insert(NAME_KEY.to_string(), Value::String(new_name.to_string()));
            return Ok(());
        }
        let objects = dict
            .get_mut(OBJECTS_KEY)
            .and_then(Value::as_array_mut)
            .ok_or_else(|| Error::DescriptorWrite(format!("{} is not an array", OBJECTS_KEY)))?;

        let current = objects
            .get(root_idx)
            .and_then(Value::as_dictionary)
            .ok_or_else(|| {
                Error::DescriptorWrite(format!("no document object at index {}", root_idx))
            })?
            .get(NAME_KEY)
            .cloned();

        let target = match current {
            Some(Value::Uid(uid)) if uid.get() != 0 => Some(uid.get() as usize),
            Some(Value::Uid(_)) | None => None,
            Some(_) => {
                return Err(Error::DescriptorWrite(
                    "name is not a UID reference".to_string(),
                ))
            }
        };

        if let Some(index) = target {
            match objects.get(index) {
                Some(Value::String(existing)) if existing == new_name => return Ok(()),
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(Error::DescriptorWrite(format!(
                        "name object at index {} is not a string",
                        index
                    )))
                }
                None => {
                    return Err(Error::DescriptorWrite(format!(
                        "name reference {} is out of range",
                        index
                    )))
                }
            }
            if count_uid_references(objects, index as u64) <= 1 {
                objects[index] = Value::String(new_name.to_string());
                return Ok(());
            }
        }

        objects.push(Value::String(new_name.to_string()));
        let new_uid = Value::Uid(Uid::new((objects.len() - 1) as u64));
        match objects.get_mut(root_idx).and_then(Value::as_dictionary_mut) {
            Some(document) => {
                document.insert(NAME_KEY.to_string(), new_uid);
                Ok(())
            }
            None => Err(Error::DescriptorWrite(format!(
                "no document object at index {}",
                root_idx
            ))),
        }
    }

    fn dictionary(&self) -> Option<&Dictionary> {
        self.root.as_dictionary()
    }
}

fn root_index(archive: &Dictionary) -> usize {
    archive
        .get(TOP_KEY)
        .and_then(Value::as_dictionary)
        .and_then(|top| top.get(ROOT_KEY))
        .and_then(Value::as_uid)
        .map(|uid| uid.get() as usize)
        .unwrap_or(DEFAULT_ROOT_INDEX)
}

fn count_uid_references(objects: &[Value], target: u64) -> usize {
    fn visit(value: &Value, target: u64) -> usize {
        match value {
            Value::Uid(uid) if uid.get() == target => 1,
            Value::Array(items) => items.iter().map(|v| visit(v, target)).sum(),
            Value::Dictionary(dict) => dict.values().map(|v| visit(v, target)).sum(),
            _ => 0,
        }
    }
    objects.iter().map(|v| visit(v, target)).sum()
}
