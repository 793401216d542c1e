// 该文件是 Qianli （千里眼） 项目的一部分。
// src/frame.rs - BGR 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};

const BGR_CHANNELS: usize = 3;

/// 解码后的源图像帧，按行主序交错存储，通道顺序为 BGR。
///
/// 摄像头和视频解码器给出的原生帧通常就是这个顺序，
/// 预处理阶段负责把它换成模型需要的 RGB。
#[derive(Debug, Clone)]
pub struct BgrHwcFrame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
}

impl BgrHwcFrame {
  pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
    let expected = BGR_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      panic!("数据长度不匹配: 期望长度 {}, 实际长度 {}", expected, data.len());
    }

    Self {
      data: data.into_boxed_slice(),
      width,
      height,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// 取 (x, y) 处的 [b, g, r] 三元组。
  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = (y as usize * self.width as usize + x as usize) * BGR_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 转回 RGB 图像，用于绘制和保存。
  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let [b, g, r] = self.pixel(x, y);
      Rgb([r, g, b])
    })
  }
}

impl From<&RgbImage> for BgrHwcFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut data = vec![0u8; width as usize * height as usize * BGR_CHANNELS];

    for y in 0..height {
      for x in 0..width {
        let pixel = image.get_pixel(x, y);
        let idx = (y as usize * width as usize + x as usize) * BGR_CHANNELS;
        data[idx] = pixel[2];
        data[idx + 1] = pixel[1];
        data[idx + 2] = pixel[0];
      }
    }

    BgrHwcFrame::new(data, width, height)
  }
}
