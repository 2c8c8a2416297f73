//! Built-in functions available in every EASL program and their typing rules.

use crate::types::{ScalarKind, Type};

/// Shape of a builtin's parameter list and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// `T -> T` over float scalars and vectors.
    FloatUnary,
    /// `T -> T` over signed numeric scalars and vectors.
    SignedUnary,
    /// `T -> T` over any numeric scalar or vector.
    NumericUnary,
    /// `(T, T) -> T` over floats.
    FloatBinary,
    /// `(T, T) -> T` over any numeric type.
    NumericBinary,
    /// `(T, T, T) -> T` over any numeric type.
    NumericTernary,
    /// `(T, T, T) -> T` over floats.
    FloatTernary,
    /// `(T, T, T | f32) -> T` over floats.
    Mix,
    /// `T -> f32` over floats.
    Length,
    /// `(T, T) -> f32` over floats.
    Distance,
    /// `(vecN<S>, vecN<S>) -> S`.
    Dot,
    /// `(vec3f, vec3f) -> vec3f`.
    Cross,
    /// `vecNf -> vecNf`.
    Normalize,
    /// `(vecNf, vecNf) -> vecNf`.
    Reflect,
    /// `bool | vecN<bool> -> bool`.
    BoolReduce,
    /// `(T, T, bool) -> T`, or component-wise with a bool vector.
    Select,
    /// `matCxRf -> matRxCf`.
    Transpose,
    /// `matNxNf -> f32`.
    Determinant,
}

#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub wgsl: &'static str,
    pub signature: Signature,
}

const fn builtin(name: &'static str, wgsl: &'static str, signature: Signature) -> Builtin {
    Builtin {
        name,
        wgsl,
        signature,
    }
}

pub static BUILTINS: &[Builtin] = &[
    builtin("sin", "sin", Signature::FloatUnary),
    builtin("cos", "cos", Signature::FloatUnary),
    builtin("tan", "tan", Signature::FloatUnary),
    builtin("asin", "asin", Signature::FloatUnary),
    builtin("acos", "acos", Signature::FloatUnary),
    builtin("atan", "atan", Signature::FloatUnary),
    builtin("sinh", "sinh", Signature::FloatUnary),
    builtin("cosh", "cosh", Signature::FloatUnary),
    builtin("tanh", "tanh", Signature::FloatUnary),
    builtin("exp", "exp", Signature::FloatUnary),
    builtin("exp2", "exp2", Signature::FloatUnary),
    builtin("log", "log", Signature::FloatUnary),
    builtin("log2", "log2", Signature::FloatUnary),
    builtin("sqrt", "sqrt", Signature::FloatUnary),
    builtin("inverse-sqrt", "inverseSqrt", Signature::FloatUnary),
    builtin("floor", "floor", Signature::FloatUnary),
    builtin("ceil", "ceil", Signature::FloatUnary),
    builtin("round", "round", Signature::FloatUnary),
    builtin("fract", "fract", Signature::FloatUnary),
    builtin("trunc", "trunc", Signature::FloatUnary),
    builtin("radians", "radians", Signature::FloatUnary),
    builtin("degrees", "degrees", Signature::FloatUnary),
    builtin("saturate", "saturate", Signature::FloatUnary),
    builtin("dpdx", "dpdx", Signature::FloatUnary),
    builtin("dpdy", "dpdy", Signature::FloatUnary),
    builtin("fwidth", "fwidth", Signature::FloatUnary),
    builtin("sign", "sign", Signature::SignedUnary),
    builtin("abs", "abs", Signature::NumericUnary),
    builtin("pow", "pow", Signature::FloatBinary),
    builtin("step", "step", Signature::FloatBinary),
    builtin("atan2", "atan2", Signature::FloatBinary),
    builtin("min", "min", Signature::NumericBinary),
    builtin("max", "max", Signature::NumericBinary),
    builtin("clamp", "clamp", Signature::NumericTernary),
    builtin("smoothstep", "smoothstep", Signature::FloatTernary),
    builtin("fma", "fma", Signature::FloatTernary),
    builtin("mix", "mix", Signature::Mix),
    builtin("length", "length", Signature::Length),
    builtin("distance", "distance", Signature::Distance),
    builtin("dot", "dot", Signature::Dot),
    builtin("cross", "cross", Signature::Cross),
    builtin("normalize", "normalize", Signature::Normalize),
    builtin("reflect", "reflect", Signature::Reflect),
    builtin("any", "any", Signature::BoolReduce),
    builtin("all", "all", Signature::BoolReduce),
    builtin("select", "select", Signature::Select),
    builtin("transpose", "transpose", Signature::Transpose),
    builtin("determinant", "determinant", Signature::Determinant),
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

impl Signature {
    pub fn arity(self) -> usize {
        match self {
            Signature::FloatUnary
            | Signature::SignedUnary
            | Signature::NumericUnary
            | Signature::Length
            | Signature::Normalize
            | Signature::BoolReduce
            | Signature::Transpose
            | Signature::Determinant => 1,
            Signature::FloatBinary
            | Signature::NumericBinary
            | Signature::Distance
            | Signature::Dot
            | Signature::Cross
            | Signature::Reflect => 2,
            Signature::NumericTernary | Signature::FloatTernary | Signature::Mix | Signature::Select => 3,
        }
    }
}

fn is_float_value(ty: &Type) -> bool {
    matches!(ty, Type::Scalar(ScalarKind::F32) | Type::Vector(ScalarKind::F32, _))
}

fn is_numeric_value(ty: &Type) -> bool {
    matches!(ty, Type::Scalar(_) | Type::Vector(_, _)) && ty.is_numeric()
}

fn is_float_vector(ty: &Type) -> bool {
    matches!(ty, Type::Vector(ScalarKind::F32, _))
}

/// All arguments equal to the first and accepted by `accepts`.
fn uniform_args(name: &str, args: &[Type], what: &str, accepts: fn(&Type) -> bool) -> Result<Type, String> {
    let first = &args[0];
    if !accepts(first) {
        return Err(format!("'{}' expects {}, got {}", name, what, first));
    }
    for arg in &args[1..] {
        if arg != first {
            return Err(format!(
                "'{}' expects all arguments to have the same type, got {} and {}",
                name, first, arg
            ));
        }
    }
    Ok(first.clone())
}

impl Builtin {
    /// Result type for a call with the given (already typed) arguments.
    pub fn result_type(&self, args: &[Type]) -> Result<Type, String> {
        let name = self.name;
        let arity = self.signature.arity();
        if args.len() != arity {
            return Err(format!(
                "'{}' expects {} argument{}, got {}",
                name,
                arity,
                if arity == 1 { "" } else { "s" },
                args.len()
            ));
        }

        match self.signature {
            Signature::FloatUnary | Signature::FloatBinary | Signature::FloatTernary => {
                uniform_args(name, args, "a float scalar or vector", is_float_value)
            }
            Signature::SignedUnary => uniform_args(name, args, "an f32 or i32 scalar or vector", |t| {
                matches!(t.scalar_kind(), Some(ScalarKind::F32 | ScalarKind::I32)) && !matches!(t, Type::Matrix { .. })
            }),
            Signature::NumericUnary | Signature::NumericBinary | Signature::NumericTernary => {
                uniform_args(name, args, "a numeric scalar or vector", is_numeric_value)
            }
            Signature::Mix => {
                let ty = uniform_args(name, &args[..2], "a float scalar or vector", is_float_value)?;
                if args[2] == ty || (args[2] == Type::F32 && is_float_vector(&ty)) {
                    Ok(ty)
                } else {
                    Err(format!("'mix' blend factor must be {} or f32, got {}", ty, args[2]))
                }
            }
            Signature::Length => {
                uniform_args(name, args, "a float scalar or vector", is_float_value)?;
                Ok(Type::F32)
            }
            Signature::Distance => {
                uniform_args(name, args, "a float scalar or vector", is_float_value)?;
                Ok(Type::F32)
            }
            Signature::Dot => {
                let ty = uniform_args(name, args, "a numeric vector", |t| {
                    matches!(t, Type::Vector(_, _)) && t.is_numeric()
                })?;
                match ty {
                    Type::Vector(kind, _) => Ok(Type::Scalar(kind)),
                    _ => Err(format!("'dot' expects vectors, got {}", ty)),
                }
            }
            Signature::Cross => {
                uniform_args(name, args, "vec3f", |t| *t == Type::Vector(ScalarKind::F32, 3))
            }
            Signature::Normalize | Signature::Reflect => {
                uniform_args(name, args, "a float vector", is_float_vector)
            }
            Signature::BoolReduce => match &args[0] {
                Type::Scalar(ScalarKind::Bool) | Type::Vector(ScalarKind::Bool, _) => Ok(Type::BOOL),
                other => Err(format!("'{}' expects a bool or bool vector, got {}", name, other)),
            },
            Signature::Select => {
                let ty = uniform_args(name, &args[..2], "a scalar or vector", |t| {
                    matches!(t, Type::Scalar(_) | Type::Vector(_, _))
                })?;
                let cond_ok = match (&ty, &args[2]) {
                    (_, Type::Scalar(ScalarKind::Bool)) => true,
                    (Type::Vector(_, n), Type::Vector(ScalarKind::Bool, m)) => n == m,
                    _ => false,
                };
                if cond_ok {
                    Ok(ty)
                } else {
                    Err(format!("'select' condition must be bool or a matching bool vector, got {}", args[2]))
                }
            }
            Signature::Transpose => match &args[0] {
                Type::Matrix { cols, rows } => Ok(Type::Matrix {
                    cols: *rows,
                    rows: *cols,
                }),
                other => Err(format!("'transpose' expects a matrix, got {}", other)),
            },
            Signature::Determinant => match &args[0] {
                Type::Matrix { cols, rows } if cols == rows => Ok(Type::F32),
                other => Err(format!("'determinant' expects a square matrix, got {}", other)),
            },
        }
    }
}
