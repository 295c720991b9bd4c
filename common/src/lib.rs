//! fuel-vision Common Library
//!
//! CLI・HTTPサーバ・ラベリングで共有される型とユーティリティ

pub mod error;
pub mod labels;
pub mod naming;
pub mod parser;
pub mod prompts;
pub mod types;

pub use error::{Error, Result};
pub use labels::{parse_label_input, LabelInput, LabelSet};
pub use naming::{format_stamp, labels_file_name, parse_stamp, results_file_name};
pub use parser::extract_answer;
pub use prompts::DEFAULT_QUESTION;
pub use types::{BatchReport, GenerationParams, ImageRecord, ItemStatus, QueryResult, QueryStatus};
