//! Exact identifiers for the methods the registry recognizes.

use graft_ir::JavaKind;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A parameter type in a method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JavaType {
    Primitive(JavaKind),
    /// One-dimensional array of a primitive kind.
    Array(JavaKind),
    /// A class or interface, by fully qualified name.
    Object(Cow<'static, str>),
}

impl JavaType {
    pub const BOOLEAN: JavaType = JavaType::Primitive(JavaKind::Boolean);
    pub const INT: JavaType = JavaType::Primitive(JavaKind::Int);
    pub const LONG: JavaType = JavaType::Primitive(JavaKind::Long);
    pub const BYTE_ARRAY: JavaType = JavaType::Array(JavaKind::Byte);
    pub const CHAR_ARRAY: JavaType = JavaType::Array(JavaKind::Char);
    pub const INT_ARRAY: JavaType = JavaType::Array(JavaKind::Int);
    pub const LONG_ARRAY: JavaType = JavaType::Array(JavaKind::Long);
    pub const OBJECT: JavaType = JavaType::Object(Cow::Borrowed("java.lang.Object"));
    pub const CLASS: JavaType = JavaType::Object(Cow::Borrowed("java.lang.Class"));

    pub fn object(name: impl Into<Cow<'static, str>>) -> Self {
        JavaType::Object(name.into())
    }

    /// The kind a value of this type has on the operand stack.
    pub fn kind(&self) -> JavaKind {
        match self {
            JavaType::Primitive(kind) => *kind,
            JavaType::Array(_) | JavaType::Object(_) => JavaKind::Object,
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Primitive(kind) => write!(f, "{kind}"),
            JavaType::Array(kind) => write!(f, "{kind}[]"),
            JavaType::Object(name) => f.write_str(name),
        }
    }
}

impl FromStr for JavaType {
    type Err = std::convert::Infallible;

    /// Parses `int`, `byte[]` or a class name. Anything that is not a primitive
    /// spelling is taken as a class name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(element) = s.strip_suffix("[]") {
            if let Ok(kind) = element.parse::<JavaKind>() {
                if kind.is_primitive() {
                    return Ok(JavaType::Array(kind));
                }
            }
        }
        match s.parse::<JavaKind>() {
            Ok(kind) if kind.is_primitive() => Ok(JavaType::Primitive(kind)),
            _ => Ok(JavaType::Object(Cow::Owned(s.to_string()))),
        }
    }
}

/// Exact key of a registry entry: owner, name, parameter types and whether the
/// method takes a receiver. Two keys that differ only in the spelling of the name
/// are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    owner: Cow<'static, str>,
    name: Cow<'static, str>,
    params: Vec<JavaType>,
    has_receiver: bool,
}

impl MethodKey {
    pub fn new(
        owner: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        params: Vec<JavaType>,
        has_receiver: bool,
    ) -> Self {
        MethodKey {
            owner: owner.into(),
            name: name.into(),
            params,
            has_receiver,
        }
    }

    pub fn static_method(
        owner: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        params: Vec<JavaType>,
    ) -> Self {
        MethodKey::new(owner, name, params, false)
    }

    pub fn instance_method(
        owner: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        params: Vec<JavaType>,
    ) -> Self {
        MethodKey::new(owner, name, params, true)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[JavaType] {
        &self.params
    }

    pub fn has_receiver(&self) -> bool {
        self.has_receiver
    }

    /// Number of call-site arguments, counting the receiver.
    pub fn argument_count(&self) -> usize {
        self.params.len() + usize::from(self.has_receiver)
    }

    /// Kinds of the call-site arguments, receiver first.
    pub fn argument_kinds(&self) -> Vec<JavaKind> {
        let receiver = self.has_receiver.then_some(JavaKind::Object);
        receiver
            .into_iter()
            .chain(self.params.iter().map(JavaType::kind))
            .collect()
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_receiver {
            f.write_str("static ")?;
        }
        write!(f, "{}.{}(", self.owner, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parses_primitive_array_and_class_names() {
        assert_eq!("int".parse::<JavaType>().unwrap(), JavaType::INT);
        assert_eq!("byte[]".parse::<JavaType>().unwrap(), JavaType::BYTE_ARRAY);
        assert_eq!(
            "java.lang.Object".parse::<JavaType>().unwrap(),
            JavaType::OBJECT
        );
        // Object arrays are not modelled as arrays; they stay opaque class names.
        assert_eq!(
            "java.lang.String[]".parse::<JavaType>().unwrap(),
            JavaType::object("java.lang.String[]")
        );
    }

    #[test]
    fn receiver_counts_as_an_argument() {
        let key = MethodKey::instance_method(
            "sun.security.provider.SHA",
            "implCompress0",
            vec![JavaType::BYTE_ARRAY, JavaType::INT],
        );
        assert_eq!(key.argument_count(), 3);
        assert_eq!(
            key.argument_kinds(),
            vec![JavaKind::Object, JavaKind::Object, JavaKind::Int]
        );
    }

    #[test]
    fn name_spelling_and_receiver_distinguish_keys() {
        let params = vec![JavaType::INT, JavaType::BYTE_ARRAY, JavaType::INT, JavaType::INT];
        let legacy = MethodKey::static_method("java.util.zip.CRC32", "updateBytes", params.clone());
        let current = MethodKey::static_method("java.util.zip.CRC32", "updateBytes0", params.clone());
        let virtual_ = MethodKey::instance_method("java.util.zip.CRC32", "updateBytes0", params);
        let keys: HashSet<_> = [legacy, current, virtual_].into_iter().collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn display_marks_static_methods() {
        let key = MethodKey::static_method(
            "java.util.zip.CRC32",
            "updateBytes0",
            vec![JavaType::INT, JavaType::BYTE_ARRAY, JavaType::INT, JavaType::INT],
        );
        assert_eq!(
            key.to_string(),
            "static java.util.zip.CRC32.updateBytes0(int, byte[], int, int)"
        );
    }
}
