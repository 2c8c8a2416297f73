//! Resolved EASL types.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I32,
    U32,
    F32,
}

impl ScalarKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, ScalarKind::Bool)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ScalarKind::I32 | ScalarKind::U32)
    }

    /// Suffix letter used in vector type names (`vec3f`, `vec2u`).
    fn letter(self) -> char {
        match self {
            ScalarKind::Bool => 'b',
            ScalarKind::I32 => 'i',
            ScalarKind::U32 => 'u',
            ScalarKind::F32 => 'f',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'b' => Some(ScalarKind::Bool),
            'i' => Some(ScalarKind::I32),
            'u' => Some(ScalarKind::U32),
            'f' => Some(ScalarKind::F32),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Bool => write!(f, "bool"),
            ScalarKind::I32 => write!(f, "i32"),
            ScalarKind::U32 => write!(f, "u32"),
            ScalarKind::F32 => write!(f, "f32"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

/// A resolved type. `Error` marks a node whose type could not be determined;
/// a diagnostic has always been reported for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Scalar(ScalarKind),
    Vector(ScalarKind, u8),
    /// Float matrix with `cols` columns of `rows` components.
    Matrix { cols: u8, rows: u8 },
    Struct(StructType),
    Function(FunctionType),
    Error,
}

impl Type {
    pub const BOOL: Type = Type::Scalar(ScalarKind::Bool);
    pub const I32: Type = Type::Scalar(ScalarKind::I32);
    pub const U32: Type = Type::Scalar(ScalarKind::U32);
    pub const F32: Type = Type::Scalar(ScalarKind::F32);

    /// Resolve a built-in type name. Struct names are resolved by the checker.
    pub fn builtin(name: &str) -> Option<Type> {
        match name {
            "bool" => return Some(Type::BOOL),
            "i32" => return Some(Type::I32),
            "u32" => return Some(Type::U32),
            "f32" => return Some(Type::F32),
            _ => {}
        }
        let bytes = name.as_bytes();
        if let Some(rest) = name.strip_prefix("vec") {
            let mut chars = rest.chars();
            let width = chars.next()?.to_digit(10)? as u8;
            let kind = ScalarKind::from_letter(chars.next()?)?;
            if chars.next().is_some() || !(2..=4).contains(&width) {
                return None;
            }
            return Some(Type::Vector(kind, width));
        }
        if name.starts_with("mat") && bytes.len() == 7 && bytes[4] == b'x' && bytes[6] == b'f' {
            let cols = (bytes[3] as char).to_digit(10)? as u8;
            let rows = (bytes[5] as char).to_digit(10)? as u8;
            if (2..=4).contains(&cols) && (2..=4).contains(&rows) {
                return Some(Type::Matrix { cols, rows });
            }
        }
        None
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Component kind of a scalar, vector or matrix.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Type::Scalar(k) | Type::Vector(k, _) => Some(*k),
            Type::Matrix { .. } => Some(ScalarKind::F32),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.scalar_kind().is_some_and(ScalarKind::is_numeric)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    /// Number of scalar components a value of this type contributes to a
    /// vector constructor.
    pub fn component_count(&self) -> Option<u8> {
        match self {
            Type::Scalar(_) => Some(1),
            Type::Vector(_, n) => Some(*n),
            _ => None,
        }
    }

    /// Type name in generated WGSL.
    pub fn wgsl(&self) -> String {
        match self {
            Type::Scalar(k) => k.to_string(),
            Type::Vector(ScalarKind::Bool, n) => format!("vec{}<bool>", n),
            Type::Vector(k, n) => format!("vec{}{}", n, k.letter()),
            Type::Matrix { cols, rows } => format!("mat{}x{}f", cols, rows),
            Type::Struct(s) => s.name.clone(),
            Type::Function(_) | Type::Error => "<error>".to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(k) => write!(f, "{}", k),
            Type::Vector(k, n) => write!(f, "vec{}{}", n, k.letter()),
            Type::Matrix { cols, rows } => write!(f, "mat{}x{}f", cols, rows),
            Type::Struct(s) => write!(f, "{}", s.name),
            Type::Function(func) => {
                write!(f, "fn(")?;
                for (i, p) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", func.ret)
            }
            Type::Error => write!(f, "<error>"),
        }
    }
}
