pub mod matcher;
pub mod merge;
pub mod mode_select;
pub mod validator;
