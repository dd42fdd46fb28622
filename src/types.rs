// Tova type system: structural types with gradual Any/Unknown handling.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type {
    // Primitives
    Int,
    Float,
    String,
    Bool,
    Nil,

    // Gradual types
    Any,
    Unknown,

    // Collections
    Array(Box<Type>),
    Tuple(Vec<Type>),

    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },

    /// Named record type; nominal by name.
    Record {
        name: String,
        fields: HashMap<String, Type>,
    },

    /// Tagged union; nominal by name. Each variant maps field name to type
    /// (tuple-style variants use positional names "0", "1", ...).
    Adt {
        name: String,
        type_params: Vec<String>,
        variants: HashMap<String, HashMap<String, Type>>,
    },

    /// An instantiation like `Option<Int>`. Zero args means the bare base
    /// name, which stays compatible with any instantiation of that base.
    Generic {
        base: String,
        args: Vec<Type>,
    },

    TypeVar(String),

    Union(Vec<Type>),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::String => write!(f, "String"),
            Type::Bool => write!(f, "Bool"),
            Type::Nil => write!(f, "Nil"),
            Type::Any => write!(f, "Any"),
            Type::Unknown => write!(f, "Unknown"),
            Type::Array(inner) => write!(f, "[{}]", inner),
            Type::Tuple(types) => {
                write!(f, "(")?;
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Record { name, .. } => write!(f, "{}", name),
            Type::Adt { name, .. } => write!(f, "{}", name),
            Type::Generic { base, args } => {
                if args.is_empty() {
                    write!(f, "{}", base)
                } else {
                    write!(f, "{}<", base)?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")
                }
            }
            Type::TypeVar(name) => write!(f, "{}", name),
            Type::Union(types) => {
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                Ok(())
            }
        }
    }
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Any | Type::Unknown)
    }

    pub fn is_gradual(&self) -> bool {
        matches!(self, Type::Any | Type::Unknown)
    }

    /// Whether a value of type `self` can be assigned where `target` is
    /// expected. `Float` to `Int` narrowing passes here; the analyzer flags
    /// it separately (and rejects it in strict mode).
    pub fn assignable_to(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }

        match (self, target) {
            // Gradual types are bidirectionally compatible with everything.
            (Type::Any, _) | (_, Type::Any) => true,
            (Type::Unknown, _) | (_, Type::Unknown) => true,

            // Int widens to Float; Float to Int is narrowing, allowed but
            // flagged outside strict mode.
            (Type::Int, Type::Float) => true,
            (Type::Float, Type::Int) => true,

            // Nil fits an Option-shaped generic.
            (Type::Nil, Type::Generic { base, .. }) if base == "Option" => true,

            // Type variables stand for anything until instantiated.
            (Type::TypeVar(_), _) | (_, Type::TypeVar(_)) => true,

            (Type::Array(a), Type::Array(b)) => a.assignable_to(b),

            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.assignable_to(y))
            }

            (Type::Function { params: pa, ret: ra }, Type::Function { params: pb, ret: rb }) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(x, y)| y.assignable_to(x))
                    && ra.assignable_to(rb)
            }

            // Records and ADTs are nominal.
            (Type::Record { name: a, .. }, Type::Record { name: b, .. }) => a == b,
            (Type::Adt { name: a, .. }, Type::Adt { name: b, .. }) => a == b,

            // A bare generic base is compatible with any instantiation of
            // the same base (gradual parameterization), and vice versa.
            (Type::Generic { base: a, args: aa }, Type::Generic { base: b, args: ba }) => {
                if a != b {
                    return false;
                }
                if aa.is_empty() || ba.is_empty() {
                    return true;
                }
                aa.len() == ba.len() && aa.iter().zip(ba.iter()).all(|(x, y)| x.assignable_to(y))
            }
            (Type::Adt { name: a, .. }, Type::Generic { base, .. })
            | (Type::Generic { base, .. }, Type::Adt { name: a, .. }) => a == base,

            (Type::Union(types), ty) => types.iter().all(|t| t.assignable_to(ty)),
            (ty, Type::Union(types)) => types.iter().any(|t| ty.assignable_to(t)),

            _ => false,
        }
    }

    /// Narrowing check used to attach a warning on `Float -> Int`.
    pub fn narrows_to(&self, target: &Type) -> bool {
        matches!((self, target), (Type::Float, Type::Int))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function { params, ret: Box::new(ret) }
    }

    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn generic(base: &str, args: Vec<Type>) -> Self {
        Type::Generic { base: base.to_string(), args }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradual_types_are_bidirectional() {
        assert!(Type::Any.assignable_to(&Type::Int));
        assert!(Type::Int.assignable_to(&Type::Any));
        assert!(Type::Unknown.assignable_to(&Type::String));
        assert!(Type::String.assignable_to(&Type::Unknown));
    }

    #[test]
    fn int_widens_float_narrows() {
        assert!(Type::Int.assignable_to(&Type::Float));
        assert!(Type::Float.assignable_to(&Type::Int));
        assert!(Type::Float.narrows_to(&Type::Int));
        assert!(!Type::Int.narrows_to(&Type::Float));
    }

    #[test]
    fn nil_fits_option() {
        let option_int = Type::generic("Option", vec![Type::Int]);
        assert!(Type::Nil.assignable_to(&option_int));
        assert!(!Type::Nil.assignable_to(&Type::Int));
    }

    #[test]
    fn arrays_are_covariant_pointwise() {
        let ints = Type::array(Type::Int);
        let floats = Type::array(Type::Float);
        let strings = Type::array(Type::String);
        assert!(ints.assignable_to(&floats));
        assert!(!ints.assignable_to(&strings));
    }

    #[test]
    fn bare_generic_matches_any_instantiation() {
        let bare = Type::generic("Result", vec![]);
        let concrete = Type::generic("Result", vec![Type::Int, Type::String]);
        assert!(bare.assignable_to(&concrete));
        assert!(concrete.assignable_to(&bare));
        assert!(!concrete.assignable_to(&Type::generic("Option", vec![])));
    }

    #[test]
    fn records_are_nominal() {
        let a = Type::Record { name: "User".to_string(), fields: HashMap::new() };
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), Type::Int);
        let b = Type::Record { name: "User".to_string(), fields };
        let c = Type::Record { name: "Account".to_string(), fields: HashMap::new() };
        assert!(a.assignable_to(&b));
        assert!(!a.assignable_to(&c));
    }

    #[test]
    fn display_formats() {
        assert_eq!(Type::array(Type::Int).to_string(), "[Int]");
        assert_eq!(
            Type::function(vec![Type::Int, Type::String], Type::Bool).to_string(),
            "(Int, String) -> Bool"
        );
        assert_eq!(Type::generic("Option", vec![Type::Int]).to_string(), "Option<Int>");
    }
}
