//! ONNX inference with `tract`.
//!
//! All networks used here take a single `[1, 3, H, W]` RGB image. [`Cnn`] samples an
//! [`ImageView`] into that tensor, letterboxing it to the network's aspect ratio.

pub mod tensor;

use std::{ops::Index, path::Path, sync::Arc};

use anyhow::{bail, ensure, Context};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TypedFact, TypedOp,
};

use crate::image::{AsImageView, Color, ImageView, Rect, Resolution};
use tensor::Tensor;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An optimized ONNX model, shared between clones.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Plan>);

impl NeuralNetwork {
    /// Loads and optimizes the model in an `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.extension().map_or(true, |ext| ext != "onnx") {
            bail!("model '{}' is not an `.onnx` file", path.display());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?;
        Self::from_onnx(&bytes).with_context(|| format!("failed to load '{}'", path.display()))
    }

    /// Parses and optimizes an in-memory ONNX model.
    pub fn from_onnx(mut bytes: &[u8]) -> anyhow::Result<Self> {
        let plan = tract_onnx::onnx()
            .model_for_read(&mut bytes)?
            .into_optimized()?
            .into_runnable()?;
        Ok(Self(Arc::new(plan)))
    }

    /// Concrete shape of every model input.
    pub fn input_shapes(&self) -> anyhow::Result<Vec<Vec<usize>>> {
        let model = self.0.model();
        (0..model.inputs.len())
            .map(|i| {
                let fact = model.input_fact(i)?;
                let shape = fact
                    .shape
                    .as_concrete()
                    .with_context(|| format!("input {i} has a symbolic shape"))?;
                Ok(shape.to_vec())
            })
            .collect()
    }

    /// Runs the model on a single input tensor.
    pub fn run(&self, input: &Tensor) -> anyhow::Result<Outputs> {
        let input = TValue::from_const(Arc::new(input.to_tract()?));
        self.0
            .run(tvec![input])?
            .iter()
            .map(|t| Tensor::from_tract(t))
            .collect()
    }
}

/// The output tensors of one inference pass, in model output order.
#[derive(Debug)]
pub struct Outputs(Vec<Tensor>);

impl Outputs {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.0[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<I: IntoIterator<Item = Tensor>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Maps 8-bit color channels linearly onto the range a network was trained on.
#[derive(Debug, Clone, Copy)]
pub struct ColorMapper {
    offset: f32,
    step: f32,
}

impl ColorMapper {
    /// Maps 0 to `min` and 255 to `max`.
    pub fn linear(min: f32, max: f32) -> Self {
        assert!(max > min, "empty color range {min}..{max}");
        Self {
            offset: min,
            step: (max - min) / 255.0,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        [color.r(), color.g(), color.b()].map(|c| self.offset + f32::from(c) * self.step)
    }
}

/// An image network with one `[1, 3, H, W]` input.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    aspect: f32,
    colors: ColorMapper,
}

impl Cnn {
    pub fn new(nn: NeuralNetwork, colors: ColorMapper) -> anyhow::Result<Self> {
        let shapes = nn.input_shapes()?;
        let (w, h) = match &shapes[..] {
            [shape] => match shape[..] {
                [1, 3, h, w] => (w, h),
                _ => bail!("expected an input of shape [1, 3, H, W], got {shape:?}"),
            },
            _ => bail!("expected a single network input, got {}", shapes.len()),
        };
        let input_res = Resolution::new(w.try_into()?, h.try_into()?);
        let aspect = input_res
            .aspect()
            .with_context(|| format!("network input {input_res} is empty"))?;

        Ok(Self {
            nn,
            input_res,
            aspect,
            colors,
        })
    }

    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Samples `view` into an input tensor, stretching it to the input resolution.
    fn input_tensor(&self, view: &ImageView<'_>) -> Tensor {
        let (w, h) = (self.input_res.width(), self.input_res.height());
        let (sx, sy) = (
            view.width() as f32 / w as f32,
            view.height() as f32 / h as f32,
        );
        Tensor::from_shape_fn([1, 3, h as usize, w as usize], |[_, c, y, x]| {
            // Nearest pixel to the center of the input cell.
            let px = ((x as f32 + 0.5) * sx) as u32;
            let py = ((y as f32 + 0.5) * sy) as u32;
            self.colors.map(view.get(px, py))[c]
        })
    }

    /// Runs the network on `image` without letterboxing.
    pub fn infer<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        self.nn.run(&self.input_tensor(&image.as_view()))
    }

    /// Pads `image` to the network's aspect ratio and runs the network on it.
    ///
    /// The returned [`Letterbox`] maps output coordinates back into `image`.
    pub fn infer_letterboxed(&self, image: &ImageView<'_>) -> anyhow::Result<(Outputs, Letterbox)> {
        let padded = image.rect().grow_to_fit_aspect(self.aspect);
        let view = image.view(padded);
        let outputs = self.infer(&view)?;
        ensure!(!outputs.is_empty(), "network produced no outputs");
        let letterbox = Letterbox {
            scale: view.width() as f32 / self.input_res.width() as f32,
            dx: padded.x().round(),
            dy: padded.y().round(),
        };
        Ok((outputs, letterbox))
    }
}

/// Transform from network input coordinates to the coordinates of the letterboxed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    scale: f32,
    dx: f32,
    dy: f32,
}

impl Letterbox {
    pub fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.dx, y * self.scale + self.dy)
    }

    /// Converts a length such as a width or a landmark depth.
    pub fn length(&self, len: f32) -> f32 {
        len * self.scale
    }

    pub fn rect(&self, rect: Rect) -> Rect {
        let (xc, yc) = rect.center();
        let (xc, yc) = self.point(xc, yc);
        Rect::from_center(
            xc,
            yc,
            self.length(rect.width()),
            self.length(rect.height()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let signed = ColorMapper::linear(-1.0, 1.0);
        assert_eq!(signed.map(Color::BLACK), [-1.0; 3]);
        assert_eq!(signed.map(Color::WHITE), [1.0; 3]);
        assert_eq!(ColorMapper::linear(0.0, 1.0).map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn letterbox_maps_back() {
        let letterbox = Letterbox {
            scale: 2.0,
            dx: -10.0,
            dy: 0.0,
        };
        assert_eq!(letterbox.point(5.0, 5.0), (0.0, 10.0));
        assert_eq!(
            letterbox.rect(Rect::from_center(10.0, 10.0, 4.0, 2.0)),
            Rect::from_center(10.0, 20.0, 8.0, 4.0)
        );
    }

    #[test]
    fn rejects_bad_models() {
        assert!(NeuralNetwork::load("palm_detection.tflite").is_err());
        assert!(NeuralNetwork::from_onnx(b"not a model").is_err());
    }
}
