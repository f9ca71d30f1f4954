use std::fmt;

/// Semantic C-level type assigned to every variable and expression.
///
/// Dynamic arrays lower to the `{ T *data; int16_t size; int16_t capacity; }`
/// layout behind a per-element-type struct tag; fixed arrays stay raw C
/// arrays, which is why their type string embeds the `{var}` placeholder.
/// Struct values are always heap-allocated, so a struct variable is a
/// pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum CType {
    Int16,
    CharPtr,
    /// `uint8_t` with the runtime's `TRUE`/`FALSE` constants.
    Bool,
    /// Fallback for values the reconstruction could not pin down.
    VoidPtr,
    Struct {
        name: String,
        fields: Vec<(String, CType)>,
    },
    Array {
        element: Box<CType>,
        capacity: i64,
        dynamic: bool,
    },
    Pointer(Box<CType>),
    /// Function return position only.
    Void,
}

impl CType {
    /// The declarator prefix for this type: either `"<type> "` (the caller
    /// appends the variable name) or a template containing `{var}`.
    pub fn type_string(&self) -> String {
        match self {
            CType::Int16 => "int16_t ".to_string(),
            CType::CharPtr => "char *".to_string(),
            CType::Bool => "uint8_t ".to_string(),
            CType::VoidPtr => "void *".to_string(),
            CType::Struct { name, .. } => format!("struct {} *", name),
            CType::Array {
                element,
                capacity,
                dynamic,
            } => {
                if *dynamic {
                    format!("struct {} ", array_tag_name(element))
                } else {
                    format!("{}{{var}}[{}]", element.type_string(), capacity)
                }
            }
            CType::Pointer(inner) => format!("{}*", inner.type_string()),
            CType::Void => "void ".to_string(),
        }
    }

    /// `type_string` with the variable name substituted in, without the
    /// trailing semicolon. `int16_t a`, `char *s`, `int16_t xs[3]`.
    pub fn declaration(&self, name: &str) -> String {
        let ts = self.type_string();
        if ts.contains("{var}") {
            ts.replace("{var}", name)
        } else {
            format!("{}{}", ts, name)
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, CType::Array { .. })
    }

    pub fn is_dynamic_array(&self) -> bool {
        matches!(self, CType::Array { dynamic: true, .. })
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_string().trim_end())
    }
}

/// Struct tag for the dynamic-array layout of a given element type, e.g.
/// `array_int16_t` or `array_str_t`. One definition is emitted per tag.
pub fn array_tag_name(element: &CType) -> String {
    format!("array_{}_t", mangle(element))
}

fn mangle(element: &CType) -> String {
    match element {
        CType::Int16 => "int16_t".to_string(),
        CType::CharPtr => "str".to_string(),
        CType::Bool => "uint8_t".to_string(),
        CType::VoidPtr => "ptr".to_string(),
        CType::Struct { name, .. } => format!("{}_ptr", name.trim_end_matches("_t")),
        CType::Array { element, .. } => format!("arr_{}", mangle(element)),
        CType::Pointer(inner) => format!("{}_ptr", mangle(inner)),
        CType::Void => "void".to_string(),
    }
}
