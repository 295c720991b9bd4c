//! 推論前の画像前処理
//!
//! デコードできるかを確かめ、画素数を `min_pixels..=max_pixels` に収めてからPNGに再エンコードする。

use crate::config::{DEFAULT_MAX_PIXELS, DEFAULT_MIN_PIXELS};
use crate::error::{FuelVisionError, InferenceError};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    min_pixels: u32,
    max_pixels: u32,
}

impl ImagePreprocessor {
    pub fn new(min_pixels: u32, max_pixels: u32) -> Self {
        Self {
            min_pixels: min_pixels.min(max_pixels),
            max_pixels,
        }
    }

    /// アスペクト比を保ったまま画素数が範囲に入るサイズを返す
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let pixels = width as f64 * height as f64;
        if pixels == 0.0 {
            return (width, height);
        }

        let (w, h) = if pixels > self.max_pixels as f64 {
            let scale = (self.max_pixels as f64 / pixels).sqrt();
            (
                ((width as f64 * scale).floor() as u32).max(1),
                ((height as f64 * scale).floor() as u32).max(1),
            )
        } else if pixels < self.min_pixels as f64 {
            let scale = (self.min_pixels as f64 / pixels).sqrt();
            (
                (width as f64 * scale).ceil() as u32,
                (height as f64 * scale).ceil() as u32,
            )
        } else {
            return (width, height);
        };

        self.clamp_to_max(w, h)
    }

    /// 極端な縦横比や切り上げで上限を超えた分は長辺を削って収める
    fn clamp_to_max(&self, width: u32, height: u32) -> (u32, u32) {
        let max = self.max_pixels as u64;
        if width as u64 * height as u64 <= max {
            return (width, height);
        }

        if width >= height {
            (((max / height as u64) as u32).max(1), height)
        } else {
            (width, ((max / width as u64) as u32).max(1))
        }
    }

    /// PNGバイト列を返す。デコードできなければ推論エラー
    pub fn prepare(&self, bytes: &[u8]) -> Result<Vec<u8>, InferenceError> {
        let img = decode(bytes).map_err(|e| InferenceError::new(e.to_string()))?;

        let (width, height) = (img.width(), img.height());
        let (target_w, target_h) = self.target_size(width, height);
        let img = if (target_w, target_h) != (width, height) {
            tracing::debug!("resize {}x{} -> {}x{}", width, height, target_w, target_h);
            img.resize_exact(target_w, target_h, FilterType::Triangle)
        } else {
            img
        };

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| InferenceError::new(format!("PNGエンコードに失敗: {}", e)))?;
        Ok(buf)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PIXELS, DEFAULT_MAX_PIXELS)
    }
}

/// 画像としてデコードできるかだけを確認する
pub fn validate_image(bytes: &[u8]) -> Result<(), FuelVisionError> {
    decode(bytes).map(|_| ())
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, FuelVisionError> {
    image::load_from_memory(bytes).map_err(|e| FuelVisionError::InvalidImage(e.to_string()))
}
