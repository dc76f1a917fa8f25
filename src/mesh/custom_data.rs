//! Typed per-element attribute layers.
//!
//! A [`CustomData`] store holds at most one layer of each [`LayerType`]. Layers
//! are looked up by element type through [`LayerData`], so callers fetch
//! deformation weights or UVs without knowing how the store lays them out.

use crate::displace::DisplacementGrid;

/// Kinds of attribute layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayerType {
    /// Per-vertex deformation group weights.
    DeformVert,
    /// Per-face UV coordinates.
    TexFace,
    /// Per-face corner colors.
    Col,
    /// Per-face displacement grids.
    Disps,
}

/// One weight of a deformation group.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeformWeight {
    /// Group index.
    pub def_nr: u32,
    /// Weight in 0..=1.
    pub weight: f32,
}

/// All deformation weights of one vertex.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeformVert {
    /// The weights, one per group the vertex belongs to.
    pub weights: Vec<DeformWeight>,
}

/// UV coordinates of the (up to) four corners of a face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TexFace {
    /// Per-corner UVs.
    pub uv: [[f32; 2]; 4],
}

/// An 8-bit ARGB corner color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MCol {
    /// Alpha.
    pub a: u8,
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl MCol {
    /// Creates a color from its components.
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }
}

/// A typed attribute layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Layer {
    /// Deformation weights, one per vertex.
    DeformVert(Vec<DeformVert>),
    /// UVs, one per face.
    TexFace(Vec<TexFace>),
    /// Corner colors, one set of four per face.
    Col(Vec<[MCol; 4]>),
    /// Displacement grids, one per face.
    Disps(Vec<DisplacementGrid>),
}

impl Layer {
    /// The layer's type tag.
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::DeformVert(_) => LayerType::DeformVert,
            Layer::TexFace(_) => LayerType::TexFace,
            Layer::Col(_) => LayerType::Col,
            Layer::Disps(_) => LayerType::Disps,
        }
    }

    /// Number of elements in the layer.
    pub fn len(&self) -> usize {
        match self {
            Layer::DeformVert(v) => v.len(),
            Layer::TexFace(v) => v.len(),
            Layer::Col(v) => v.len(),
            Layer::Disps(v) => v.len(),
        }
    }

    /// True if the layer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element types that can be stored in a [`Layer`].
pub trait LayerData: Sized + Clone {
    /// Type tag of the layer holding this element.
    const TYPE: LayerType;

    /// Borrows the elements if `layer` holds this type.
    fn slice(layer: &Layer) -> Option<&[Self]>;

    /// Mutably borrows the elements if `layer` holds this type.
    fn vec_mut(layer: &mut Layer) -> Option<&mut Vec<Self>>;

    /// Wraps elements into a layer.
    fn into_layer(data: Vec<Self>) -> Layer;
}

macro_rules! impl_layer_data {
    ($ty:ty, $variant:ident) => {
        impl LayerData for $ty {
            const TYPE: LayerType = LayerType::$variant;

            fn slice(layer: &Layer) -> Option<&[Self]> {
                match layer {
                    Layer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn vec_mut(layer: &mut Layer) -> Option<&mut Vec<Self>> {
                match layer {
                    Layer::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_layer(data: Vec<Self>) -> Layer {
                Layer::$variant(data)
            }
        }
    };
}

impl_layer_data!(DeformVert, DeformVert);
impl_layer_data!(TexFace, TexFace);
impl_layer_data!([MCol; 4], Col);
impl_layer_data!(DisplacementGrid, Disps);

/// A set of attribute layers for one element domain (vertices or faces).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CustomData {
    layers: Vec<Layer>,
}

impl CustomData {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a layer of `ty` exists.
    pub fn has_layer(&self, ty: LayerType) -> bool {
        self.layers.iter().any(|l| l.layer_type() == ty)
    }

    /// Borrows the layer holding `T`.
    pub fn layer<T: LayerData>(&self) -> Option<&[T]> {
        self.layers.iter().find_map(T::slice)
    }

    /// Mutably borrows the layer holding `T`.
    pub fn layer_mut<T: LayerData>(&mut self) -> Option<&mut Vec<T>> {
        self.layers.iter_mut().find_map(T::vec_mut)
    }

    /// Element `i` of the layer holding `T`.
    pub fn get<T: LayerData>(&self, i: usize) -> Option<&T> {
        self.layer::<T>().and_then(|l| l.get(i))
    }

    /// Adds (or replaces) the layer holding `T`.
    pub fn add_layer<T: LayerData>(&mut self, data: Vec<T>) {
        let layer = T::into_layer(data);
        match self.layers.iter_mut().find(|l| l.layer_type() == T::TYPE) {
            Some(slot) => *slot = layer,
            None => self.layers.push(layer),
        }
    }

    /// Removes the layer of `ty`, returning it if present.
    pub fn remove_layer(&mut self, ty: LayerType) -> Option<Layer> {
        let pos = self.layers.iter().position(|l| l.layer_type() == ty)?;
        Some(self.layers.remove(pos))
    }

    /// Iterates over all layers.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookup() {
        let mut data = CustomData::new();
        assert!(!data.has_layer(LayerType::Col));

        data.add_layer(vec![[MCol::new(255, 10, 20, 30); 4]; 2]);
        data.add_layer(vec![TexFace::default(); 2]);

        assert!(data.has_layer(LayerType::Col));
        assert!(data.has_layer(LayerType::TexFace));
        assert_eq!(data.get::<[MCol; 4]>(1).map(|c| c[0].g), Some(20));
        assert!(data.layer::<DeformVert>().is_none());
    }

    #[test]
    fn test_add_replaces_existing() {
        let mut data = CustomData::new();
        data.add_layer(vec![TexFace::default(); 2]);
        data.add_layer(vec![TexFace::default(); 5]);
        assert_eq!(data.layers().count(), 1);
        assert_eq!(data.layer::<TexFace>().map(|l| l.len()), Some(5));
    }

    #[test]
    fn test_remove_layer() {
        let mut data = CustomData::new();
        data.add_layer(vec![DeformVert::default()]);
        let removed = data.remove_layer(LayerType::DeformVert);
        assert!(matches!(removed, Some(Layer::DeformVert(_))));
        assert!(data.remove_layer(LayerType::DeformVert).is_none());
    }
}
