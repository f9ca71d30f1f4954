use super::ctype::CType;

/// Everything the later passes need to know about one named binding.
///
/// Created during the type pre-pass and immutable afterwards, except
/// `escapes`, which the memory manager may promote from false to true.
#[derive(Debug, Clone)]
pub struct VariableInfo {
    pub name: String,
    pub ctype: CType,
    /// The value is represented as a heap object (struct, or the backing
    /// buffer of a dynamic array).
    pub requires_allocation: bool,
    pub is_dynamic_array: bool,
    /// This binding receives a fresh allocation at its declaration site, as
    /// opposed to aliasing one that already exists. Only owning bindings get
    /// allocator calls and release sites.
    pub owns_allocation: bool,
    /// May outlive the declaring function; released through the global
    /// pointer table instead of at scope exit.
    pub escapes: bool,
}

/// A function's reconstructed C signature.
#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub parameters: Vec<(String, CType)>,
    pub return_type: CType,
}

/// An aggregate definition the emitter must write out exactly once, in
/// first-seen order (which respects dependency order by construction).
#[derive(Debug, Clone)]
pub enum TypedefRecord {
    Struct {
        name: String,
        fields: Vec<(String, CType)>,
    },
    Array {
        element: CType,
    },
}
