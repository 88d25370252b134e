use image::RgbImage;

/// Per-output-pixel taps along one axis: `(first source index, normalized weights)`.
fn kernel(out_len: u32, factor: u32) -> Vec<(i64, Vec<f32>)> {
    let f = f64::from(factor);
    let radius = i64::from(factor);
    let sigma = f / 2.0;
    (0..out_len)
        .map(|i| {
            let center = (f64::from(i) + 0.5) * f - 0.5;
            let first = center.floor() as i64 - radius + 1;
            let mut weights: Vec<f32> = (0..2 * radius)
                .map(|k| {
                    let d = (first + k) as f64 - center;
                    (-(d * d) / (2.0 * sigma * sigma)).exp() as f32
                })
                .collect();
            let sum: f32 = weights.iter().sum();
            for w in &mut weights {
                *w /= sum;
            }
            (first, weights)
        })
        .collect()
}

fn clamp_index(i: i64, len: u32) -> usize {
    i.clamp(0, i64::from(len) - 1) as usize
}

/// Reduces `image` by an integer `factor` with a Gaussian-weighted box filter.
///
/// A factor of 0 or 1 returns the buffer unchanged. Otherwise each output pixel averages a
/// `2 * factor` tap window (clamped at the edges) weighted by a Gaussian of sigma `factor / 2`.
pub fn downsample(image: &RgbImage, factor: u32) -> RgbImage {
    if factor <= 1 {
        return image.clone();
    }
    let (in_w, in_h) = image.dimensions();
    let out_w = in_w.div_ceil(factor).max(1);
    let out_h = in_h.div_ceil(factor).max(1);
    let kx = kernel(out_w, factor);
    let ky = kernel(out_h, factor);

    // Horizontal pass: out_w x in_h, three channels.
    let mut tmp = vec![0f32; out_w as usize * in_h as usize * 3];
    for y in 0..in_h {
        for (x, (first, weights)) in kx.iter().enumerate() {
            let mut acc = [0f32; 3];
            for (k, w) in weights.iter().enumerate() {
                let sx = clamp_index(first + k as i64, in_w) as u32;
                let px = image.get_pixel(sx, y).0;
                for (a, v) in acc.iter_mut().zip(px) {
                    *a += w * f32::from(v);
                }
            }
            let at = (y as usize * out_w as usize + x) * 3;
            tmp[at..at + 3].copy_from_slice(&acc);
        }
    }

    let mut out = RgbImage::new(out_w, out_h);
    for (y, (first, weights)) in ky.iter().enumerate() {
        for x in 0..out_w as usize {
            let mut acc = [0f32; 3];
            for (k, w) in weights.iter().enumerate() {
                let sy = clamp_index(first + k as i64, in_h);
                let at = (sy * out_w as usize + x) * 3;
                for (a, v) in acc.iter_mut().zip(&tmp[at..at + 3]) {
                    *a += w * v;
                }
            }
            let px = acc.map(|v| v.round().clamp(0.0, 255.0) as u8);
            out.put_pixel(x as u32, y as u32, image::Rgb(px));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn factor_one_is_identity() {
        let img = gradient(17, 9);
        assert_eq!(downsample(&img, 1), img);
    }

    #[test]
    fn flat_images_stay_flat() {
        let img = RgbImage::from_pixel(12, 8, image::Rgb([40, 200, 90]));
        let out = downsample(&img, 3);
        assert_eq!(out.dimensions(), (4, 3));
        assert!(out.pixels().all(|p| p.0 == [40, 200, 90]));
    }

    #[test]
    fn weights_sum_to_one() {
        for (_, weights) in kernel(5, 4) {
            let sum: f32 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert_eq!(weights.len(), 8);
        }
    }

    #[test]
    fn odd_sizes_round_up() {
        let out = downsample(&gradient(7, 5), 2);
        assert_eq!(out.dimensions(), (4, 3));
    }
}
