pub mod ctype;
pub mod helper;
pub mod variable;


pub use self::ctype::{array_tag_name, CType};
pub use self::helper::{scoped_key, TypeHelper};
pub use self::variable::{FunctionSig, TypedefRecord, VariableInfo};
