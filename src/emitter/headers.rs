/// Closed enumeration of every `#include` the translator may emit. The
/// runtime headers are provided by the C-side support library, not generated
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HeaderKey {
    StdioH,
    StdlibH,
    StringH,
    AssertH,
    /// `TRUE` / `FALSE` constants.
    Bool,
    /// Value-coercion helpers: `js_eq`, `js_get`.
    JsEq,
    /// `ARRAY_CREATE` / `ARRAY_PUSH` over the `{data,size,capacity}` layout.
    Array,
    /// `ARRAY_POP`.
    ArrayPop,
}

impl HeaderKey {
    /// Canonical emission order: standard headers, then runtime headers.
    pub const ALL: [HeaderKey; 8] = [
        HeaderKey::StdioH,
        HeaderKey::StdlibH,
        HeaderKey::StringH,
        HeaderKey::AssertH,
        HeaderKey::Bool,
        HeaderKey::JsEq,
        HeaderKey::Array,
        HeaderKey::ArrayPop,
    ];

    pub fn include_line(&self) -> &'static str {
        match self {
            HeaderKey::StdioH => "#include <stdio.h>",
            HeaderKey::StdlibH => "#include <stdlib.h>",
            HeaderKey::StringH => "#include <string.h>",
            HeaderKey::AssertH => "#include <assert.h>",
            HeaderKey::Bool => "#include \"runtime/bool.h\"",
            HeaderKey::JsEq => "#include \"runtime/js_eq.h\"",
            HeaderKey::Array => "#include \"runtime/array.h\"",
            HeaderKey::ArrayPop => "#include \"runtime/array_pop.h\"",
        }
    }
}
