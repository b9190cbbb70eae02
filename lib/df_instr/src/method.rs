//! Fully qualified method signatures.

use crate::errors::{InstrError, InstrResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fully qualified method signature: defining class, method name and
/// shorty prototype descriptor.
///
/// The textual form is the one used everywhere as lookup key and in
/// coverage traces: `com.example.Foo->bar(II)V`. Class names given with
/// slashes are normalized to the dotted form at construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodSig {
    class: String,
    name: String,
    proto: String,
}

impl MethodSig {
    pub fn new(class: &str, name: &str, proto: &str) -> Self {
        Self {
            class: class.replace('/', "."),
            name: name.to_string(),
            proto: proto.to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn proto(&self) -> &str {
        &self.proto
    }

    /// The `name(proto)` part, without the defining class.
    #[must_use]
    pub fn member_name(&self) -> String {
        format!("{}{}", self.name, self.proto)
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    /// Same signature re-homed on another defining class.
    #[must_use]
    pub fn on_class(&self, class: &str) -> Self {
        Self::new(class, &self.name, &self.proto)
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}->{}{}", self.class, self.name, self.proto)
    }
}

impl FromStr for MethodSig {
    type Err = InstrError;

    fn from_str(s: &str) -> InstrResult<Self> {
        let (class, member) = s
            .split_once("->")
            .ok_or_else(|| InstrError::MalformedSignature(s.to_string()))?;
        let paren = member
            .find('(')
            .ok_or_else(|| InstrError::MalformedSignature(s.to_string()))?;
        let (name, proto) = member.split_at(paren);
        if class.is_empty() || name.is_empty() || !proto.contains(')') {
            return Err(InstrError::MalformedSignature(s.to_string()));
        }
        Ok(Self::new(class, name, proto))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let sig: MethodSig = "com.example.Foo->bar(II)V".parse().unwrap();
        assert_eq!(sig.class_name(), "com.example.Foo");
        assert_eq!(sig.name(), "bar");
        assert_eq!(sig.proto(), "(II)V");
        assert_eq!(sig.to_string(), "com.example.Foo->bar(II)V");
    }

    #[test]
    fn slashed_class_is_normalized() {
        let sig: MethodSig = "com/example/Foo-><init>()V".parse().unwrap();
        assert_eq!(sig.class_name(), "com.example.Foo");
        assert!(sig.is_constructor());
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!("com.example.Foo".parse::<MethodSig>().is_err());
        assert!("com.example.Foo->bar".parse::<MethodSig>().is_err());
        assert!("->bar()V".parse::<MethodSig>().is_err());
    }
}
