/// SSD anchor layout, following MediaPipe's SsdAnchorsCalculator.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorOptions {
    pub input_width: u32,
    pub input_height: u32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub anchor_offset: f32,
    pub strides: Vec<u32>,
    pub aspect_ratios: Vec<f32>,
    pub interpolated_scale_aspect_ratio: f32,
    pub reduce_boxes_in_lowest_layer: bool,
    pub fixed_anchor_size: bool,
}

/// Anchor center and size, normalized to the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl AnchorOptions {
    /// Short range BlazeFace and the lite palm detector
    pub fn blaze_128() -> Self {
        Self {
            input_width: 128,
            input_height: 128,
            min_scale: 0.1484375,
            max_scale: 0.75,
            anchor_offset: 0.5,
            strides: vec![8, 16, 16, 16],
            aspect_ratios: vec![1.],
            interpolated_scale_aspect_ratio: 1.,
            reduce_boxes_in_lowest_layer: false,
            fixed_anchor_size: true,
        }
    }

    /// Full range palm detector
    pub fn palm_192() -> Self {
        Self {
            input_width: 192,
            input_height: 192,
            strides: vec![8, 16, 16, 16],
            ..Self::blaze_128()
        }
    }
}

fn scale(min_scale: f32, max_scale: f32, stride: usize, strides: usize) -> f32 {
    if strides == 1 {
        (min_scale + max_scale) * 0.5
    } else {
        min_scale + (max_scale - min_scale) * stride as f32 / (strides as f32 - 1.)
    }
}

pub fn gen_anchors(options: &AnchorOptions) -> Vec<Anchor> {
    let strides = &options.strides;
    let mut anchors = Vec::new();
    let mut layer_id = 0;

    while layer_id < strides.len() {
        let mut aspect_ratios = Vec::new();
        let mut scales = Vec::new();

        // Layers sharing a stride are merged into one grid
        let mut last_same_stride_layer = layer_id;
        while last_same_stride_layer < strides.len()
            && strides[last_same_stride_layer] == strides[layer_id]
        {
            let s = scale(
                options.min_scale,
                options.max_scale,
                last_same_stride_layer,
                strides.len(),
            );

            if last_same_stride_layer == 0 && options.reduce_boxes_in_lowest_layer {
                aspect_ratios.extend([1., 2., 0.5]);
                scales.extend([0.1, s, s]);
            } else {
                for ratio in &options.aspect_ratios {
                    aspect_ratios.push(*ratio);
                    scales.push(s);
                }
                if options.interpolated_scale_aspect_ratio > 0. {
                    let next = if last_same_stride_layer == strides.len() - 1 {
                        1.
                    } else {
                        scale(
                            options.min_scale,
                            options.max_scale,
                            last_same_stride_layer + 1,
                            strides.len(),
                        )
                    };
                    scales.push((s * next).sqrt());
                    aspect_ratios.push(options.interpolated_scale_aspect_ratio);
                }
            }
            last_same_stride_layer += 1;
        }

        let sizes: Vec<(f32, f32)> = aspect_ratios
            .iter()
            .zip(&scales)
            .map(|(ratio, s)| {
                let ratio_sqrt = ratio.sqrt();
                (s * ratio_sqrt, s / ratio_sqrt)
            })
            .collect();

        let stride = strides[layer_id];
        let rows = options.input_height.div_ceil(stride);
        let cols = options.input_width.div_ceil(stride);

        for y in 0..rows {
            for x in 0..cols {
                for (w, h) in &sizes {
                    let (w, h) = if options.fixed_anchor_size {
                        (1., 1.)
                    } else {
                        (*w, *h)
                    };
                    anchors.push(Anchor {
                        x: (x as f32 + options.anchor_offset) / cols as f32,
                        y: (y as f32 + options.anchor_offset) / rows as f32,
                        w,
                        h,
                    });
                }
            }
        }

        layer_id = last_same_stride_layer;
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blaze_anchor_count() {
        let anchors = gen_anchors(&AnchorOptions::blaze_128());
        // 16x16 grid with 2 anchors per cell, then an 8x8 grid with 6
        assert_eq!(anchors.len(), 896);

        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(
            anchors[0],
            Anchor {
                x: 0.5 / 16.,
                y: 0.5 / 16.,
                w: 1.,
                h: 1.
            }
        );
        assert_eq!(anchors[2].x, 1.5 / 16.);

        let coarse = anchors[512];
        assert_eq!((coarse.x, coarse.y), (0.5 / 8., 0.5 / 8.));
        assert_eq!(anchors[895].x, 7.5 / 8.);
    }

    #[test]
    fn test_palm_anchor_count() {
        // 24x24x2 + 12x12x6
        assert_eq!(gen_anchors(&AnchorOptions::palm_192()).len(), 2016);
    }

    #[test]
    fn test_sized_anchors() {
        let options = AnchorOptions {
            fixed_anchor_size: false,
            strides: vec![64],
            ..AnchorOptions::blaze_128()
        };
        let anchors = gen_anchors(&options);
        assert_eq!(anchors.len(), 2 * 2 * 2);

        // single layer uses the midpoint scale, interpolated towards 1
        let mid: f32 = (0.1484375 + 0.75) * 0.5;
        assert!((anchors[0].w - mid).abs() < 1e-6);
        assert!((anchors[1].w - mid.sqrt()).abs() < 1e-6);
    }
}
