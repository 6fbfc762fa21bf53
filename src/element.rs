use std::borrow::Cow;

use zarrs::array::Array;

/// The numeric element types which can be read as samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl ElementKind {
    /// Map a Zarr V3 data type name.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            _ => return None,
        };
        Some(kind)
    }

    /// Element kind of an array; errors for data types without a numeric sample representation.
    pub fn of<S: ?Sized>(array: &Array<S>) -> crate::Result<Self> {
        let name = array
            .data_type()
            .name_v3()
            .map_or_else(String::new, Cow::into_owned);
        Self::from_name(&name).ok_or_else(|| {
            crate::Error::computation(
                array.path().as_str(),
                format!("unsupported data type \"{name}\""),
            )
        })
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Evaluate `$body` with `$t` aliased to the Rust type of an [`ElementKind`].
macro_rules! with_element_type {
    ($kind:expr, $t:ident => $body:block) => {
        match $kind {
            $crate::element::ElementKind::Int8 => {
                type $t = i8;
                $body
            }
            $crate::element::ElementKind::Int16 => {
                type $t = i16;
                $body
            }
            $crate::element::ElementKind::Int32 => {
                type $t = i32;
                $body
            }
            $crate::element::ElementKind::Int64 => {
                type $t = i64;
                $body
            }
            $crate::element::ElementKind::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::element::ElementKind::UInt16 => {
                type $t = u16;
                $body
            }
            $crate::element::ElementKind::UInt32 => {
                type $t = u32;
                $body
            }
            $crate::element::ElementKind::UInt64 => {
                type $t = u64;
                $body
            }
            $crate::element::ElementKind::Float32 => {
                type $t = f32;
                $body
            }
            $crate::element::ElementKind::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}

pub(crate) use with_element_type;
