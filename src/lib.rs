//! fuel-vision
//!
//! 燃料計の画像フォルダに対して「燃料をどれだけ消費したか」をVLMに問い合わせるバッチ実行、
//! 正解ラベルの対話入力、同じ問い合わせをHTTPで公開するサーバ。

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod labeling;
pub mod logging;
pub mod report;
pub mod runner;
pub mod scanner;
pub mod server;
pub mod vision;

pub use fuel_vision_common as common;
