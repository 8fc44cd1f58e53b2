pub mod warn;
pub mod error;
pub mod util;
pub mod io_util;
pub mod easy_fs;

pub mod expr;
pub mod request;
pub mod html;
pub mod scanner;
pub mod node;
pub mod view;
pub mod options;
pub mod statics;
pub mod rules;
pub mod model;
pub mod config;
pub mod tags;
pub mod fields;
pub mod form;
pub mod registry;
pub mod placeholder;
pub mod template;
pub mod cache;
pub mod compiler;
