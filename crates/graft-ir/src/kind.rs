use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The value kinds the hosted VM distinguishes on its operand stack.
///
/// Sub-word kinds (`Boolean`, `Byte`, `Short`, `Char`) occupy an `Int` stack slot
/// but keep their own array element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JavaKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Float,
    Long,
    Double,
    Object,
    Void,
}

impl JavaKind {
    /// Size in bytes of a value of this kind when stored in a primitive array.
    ///
    /// `Object` reports the uncompressed word size; the heap layout decides the real
    /// reference size. `Void` has no storage.
    pub fn byte_count(self) -> u32 {
        match self {
            JavaKind::Boolean | JavaKind::Byte => 1,
            JavaKind::Short | JavaKind::Char => 2,
            JavaKind::Int | JavaKind::Float => 4,
            JavaKind::Long | JavaKind::Double | JavaKind::Object => 8,
            JavaKind::Void => 0,
        }
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, JavaKind::Object | JavaKind::Void)
    }

    /// The kind this value takes once pushed on the operand stack.
    pub fn stack_kind(self) -> JavaKind {
        match self {
            JavaKind::Boolean | JavaKind::Byte | JavaKind::Short | JavaKind::Char => JavaKind::Int,
            other => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JavaKind::Boolean => "boolean",
            JavaKind::Byte => "byte",
            JavaKind::Short => "short",
            JavaKind::Char => "char",
            JavaKind::Int => "int",
            JavaKind::Float => "float",
            JavaKind::Long => "long",
            JavaKind::Double => "double",
            JavaKind::Object => "object",
            JavaKind::Void => "void",
        }
    }
}

impl fmt::Display for JavaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value kind `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for JavaKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "boolean" => JavaKind::Boolean,
            "byte" => JavaKind::Byte,
            "short" => JavaKind::Short,
            "char" => JavaKind::Char,
            "int" => JavaKind::Int,
            "float" => JavaKind::Float,
            "long" => JavaKind::Long,
            "double" => JavaKind::Double,
            "object" => JavaKind::Object,
            "void" => JavaKind::Void,
            other => return Err(UnknownKind(other.to_string())),
        };
        Ok(kind)
    }
}
