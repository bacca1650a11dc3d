//! Payload layouts, records, and items.

use std::collections::HashSet;
use std::sync::Arc;

use crate::bits::Bits;
use crate::error::BuildError;

/// Signal names a payload field may not take.
const RESERVED: [&str; 5] = ["valid", "ready", "first", "last", "payload"];

/// One entry of a layout descriptor: a named leaf or a named nested group.
///
/// Groups flatten into dotted paths once, at construction.
#[derive(Debug, Clone)]
pub enum FieldDef {
    /// A named fixed-width leaf.
    Leaf(String, usize),
    /// A named group of nested entries.
    Group(String, Vec<FieldDef>),
}

impl FieldDef {
    /// Creates a nested group entry.
    pub fn group<I>(name: &str, entries: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldDef>,
    {
        Self::Group(name.to_string(), entries.into_iter().map(Into::into).collect())
    }
}

impl From<(&str, usize)> for FieldDef {
    fn from((name, width): (&str, usize)) -> Self {
        Self::Leaf(name.to_string(), width)
    }
}

/// A flattened field of a validated layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    width: usize,
    offset: usize,
}

impl Field {
    /// Returns the flattened (dotted) field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field width in bits.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the field offset within the packed payload.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// A validated payload layout: an ordered list of named fixed-width fields.
///
/// All validation happens here, eagerly; components downstream resolve field
/// names to `(offset, width)` ranges once at construction and never reflect at
/// run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fields: Vec<Field>,
    width: usize,
}

impl Layout {
    /// Builds a layout from a descriptor, flattening nested groups.
    pub fn new<I>(defs: I) -> Result<Arc<Self>, BuildError>
    where
        I: IntoIterator,
        I::Item: Into<FieldDef>,
    {
        let defs = defs.into_iter().map(Into::into).collect::<Vec<_>>();
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;
        flatten(&defs, "", &mut fields, &mut seen, &mut offset)?;
        Ok(Arc::new(Self { fields, width: offset }))
    }

    /// Builds the ubiquitous single-field `data` layout.
    pub fn data(width: usize) -> Arc<Self> {
        Self::new([("data", width)]).expect("`data` is not reserved")
    }

    /// Returns the total packed width in bits.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the flattened fields in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks a field up by its flattened name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn flatten(
    defs: &[FieldDef], prefix: &str, fields: &mut Vec<Field>, seen: &mut HashSet<String>, offset: &mut usize,
) -> Result<(), BuildError> {
    for def in defs {
        match def {
            FieldDef::Leaf(name, width) => {
                let path = join(prefix, name);
                check_name(name, &path, seen)?;
                fields.push(Field { name: path, width: *width, offset: *offset });
                *offset += width;
            }
            FieldDef::Group(name, entries) => {
                let path = join(prefix, name);
                check_name(name, &path, seen)?;
                flatten(entries, &path, fields, seen, offset)?;
            }
        }
    }
    Ok(())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_name(name: &str, path: &str, seen: &mut HashSet<String>) -> Result<(), BuildError> {
    if RESERVED.contains(&name) {
        return Err(BuildError::ReservedField(name.to_string()));
    }
    if !seen.insert(path.to_string()) {
        return Err(BuildError::DuplicateField(path.to_string()));
    }
    Ok(())
}

/// One payload instance bound to a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    layout: Arc<Layout>,
    bits: Bits,
}

impl Record {
    /// Creates an all-zero record over `layout`.
    pub fn new(layout: &Arc<Layout>) -> Self {
        Self { layout: Arc::clone(layout), bits: Bits::zero(layout.width()) }
    }

    /// Reinterprets raw payload bits as a record over `layout`.
    ///
    /// Panics if the widths differ; callers resolve widths at construction.
    pub fn from_bits(layout: &Arc<Layout>, bits: Bits) -> Self {
        assert_eq!(bits.width(), layout.width(), "payload width mismatch");
        Self { layout: Arc::clone(layout), bits }
    }

    /// Returns the layout this record is bound to.
    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Returns the packed payload bits.
    pub fn bits(&self) -> &Bits {
        &self.bits
    }

    /// Reads a field as an integer (low 64 bits for wider fields).
    ///
    /// Panics on an unknown field name; names are fixed at construction.
    pub fn get(&self, name: &str) -> u64 {
        let field = self.layout.field(name).unwrap_or_else(|| panic!("no field `{}` in layout", name));
        self.bits.slice(field.offset(), field.width()).to_u64()
    }

    /// Reads a field as raw bits.
    pub fn get_bits(&self, name: &str) -> Bits {
        let field = self.layout.field(name).unwrap_or_else(|| panic!("no field `{}` in layout", name));
        self.bits.slice(field.offset(), field.width())
    }

    /// Writes a field from an integer, masking to the field width.
    pub fn set(&mut self, name: &str, value: u64) -> &mut Self {
        let field = self.layout.field(name).unwrap_or_else(|| panic!("no field `{}` in layout", name));
        let value = Bits::from_u64(value, field.width());
        self.bits.splice(field.offset(), &value);
        self
    }

    /// Writes a field from raw bits.
    pub fn set_bits(&mut self, name: &str, value: &Bits) -> &mut Self {
        let field = self.layout.field(name).unwrap_or_else(|| panic!("no field `{}` in layout", name));
        assert_eq!(value.width(), field.width(), "field `{}` width mismatch", name);
        self.bits.splice(field.offset(), value);
        self
    }
}
