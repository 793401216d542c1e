// 该文件是 Qianli （千里眼） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Qianli Project Contributors

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::labels::Labels;
use crate::model::{DetectItem, DetectResult};

// 标签文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_COLOR: [u8; 3] = [255, 0, 0];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const BORDER_THICKNESS: i32 = 2;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取失败: {0}")]
  IoError(std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(ab_glyph::InvalidFont),
}

/// 把检测框和标签画到 RGB 图像上。
///
/// 不内嵌缺省字体，字体文件的再分发许可与 Apache-2.0 不一定兼容。
/// 未通过 `with_font_file` 提供字体时只画边框，不渲染文本，
/// 类别名仍会写进日志。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  box_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Draw {
      font: None,
      font_size: LABEL_FONT_SIZE,
      box_color: BOX_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path).map_err(DrawError::IoError)?;
    let font = FontVec::try_from_vec(data).map_err(DrawError::InvalidFont)?;

    Ok(Draw {
      font: Some(font),
      ..Draw::default()
    })
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult, labels: &Labels) {
    for item in result.items.iter() {
      self.draw_item(image, item, labels);
    }
  }

  // bbox 为源图像像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem, labels: &Labels) {
    let (width, height) = (image.width() as i32, image.height() as i32);

    let x_min = (item.bbox[0].floor() as i32).clamp(0, width - 1);
    let y_min = (item.bbox[1].floor() as i32).clamp(0, height - 1);
    let x_max = (item.bbox[2].ceil() as i32).clamp(0, width - 1);
    let y_max = (item.bbox[3].ceil() as i32).clamp(0, height - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for inset in 0..BORDER_THICKNESS {
      let box_width = (x_max - x_min - 2 * inset).max(1) as u32;
      let box_height = (y_max - y_min - 2 * inset).max(1) as u32;
      draw_hollow_rect_mut(
        image,
        Rect::at(x_min + inset, y_min + inset).of_size(box_width, box_height),
        Rgb(self.box_color),
      );
    }

    if let Some(font) = &self.font {
      let label = format!("{} {:.2}", labels.name(item.class_id), item.score);

      // 估算文本大小（粗略估计）
      let text_width = (label.len() as f32 * LABEL_CHAR_WIDTH) as i32;
      let label_x = x_min;
      let label_y = (y_min - LABEL_TEXT_HEIGHT).max(0);
      let label_width = text_width.min(width - label_x).max(0) as u32;

      if label_width == 0 {
        return;
      }

      draw_filled_rect_mut(
        image,
        Rect::at(label_x, label_y).of_size(label_width, LABEL_TEXT_HEIGHT as u32),
        Rgb(self.box_color),
      );
      draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        label_x,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;

  fn result(bbox: [f32; 4]) -> DetectResult {
    DetectResult {
      items: vec![DetectItem {
        class_id: 0,
        score: 0.9,
        bbox,
      }]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn draws_border_inside_the_box() {
    let mut image = RgbImage::new(20, 20);
    Draw::default().draw_detections(&mut image, &result([4.0, 4.0, 15.0, 15.0]), &Labels::default());

    assert_eq!(*image.get_pixel(4, 4), Rgb(BOX_COLOR));
    assert_eq!(*image.get_pixel(10, 4), Rgb(BOX_COLOR));
    assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
  }

  #[test]
  fn out_of_bounds_boxes_are_clamped() {
    let mut image = RgbImage::new(10, 10);
    Draw::default().draw_detections(
      &mut image,
      &result([-5.0, -5.0, 40.0, 40.0]),
      &Labels::default(),
    );
    // 不越界即可
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let mut image = RgbImage::new(10, 10);
    Draw::default().draw_detections(&mut image, &result([5.0, 5.0, 5.0, 5.0]), &Labels::default());
    assert!(image.pixels().all(|pixel| *pixel == Rgb([0, 0, 0])));
  }
}
