use crate::{
    layers::{BasicLayer, Layer, LayerBuilder},
    storage::{Allocator, WeightStorage},
};

/// This trait allows network architectures to be build using the LinearBuilder
pub trait LinearConstruction {
    type Layer;
    type Error;
    type Output;

    fn construct(
        weights: WeightStorage,
        in_size: usize,
        layers: Vec<Self::Layer>,
    ) -> Result<Self::Output, Self::Error>;
}

/// Builder for networks where all layers have only a single input and output.
pub struct LinearBuilder<L = BasicLayer> {
    allocator: Allocator,
    layers: Vec<L>,
    in_size: usize,
}

impl<L> LinearBuilder<L>
where
    L: Layer,
{
    pub fn new(in_size: usize) -> Self {
        LinearBuilder {
            allocator: Allocator::new(),
            layers: Vec::new(),
            in_size,
        }
    }

    fn last_out_size(&self) -> usize {
        self.layers.last().map_or(self.in_size, |l| l.output())
    }

    /// Adds a single layer to the network.
    pub fn layer<T>(mut self, layer: T) -> Self
    where
        T: LayerBuilder,
        T::Output: Into<L>,
    {
        let in_size = self.last_out_size();
        let layer = layer.connect(in_size, &mut self.allocator).into();
        self.layers.push(layer);
        self
    }

    /// Adds all of the layers provided by the `builders` argument.
    pub fn layers<T>(mut self, builders: T) -> Self
    where
        T: IntoIterator,
        T::Item: LayerBuilder,
        <T::Item as LayerBuilder>::Output: Into<L>,
    {
        for builder in builders {
            self = self.layer(builder);
        }
        self
    }

    /// Builds the network. Fails if no layers had been provided.
    pub fn build<T>(self) -> Result<T::Output, T::Error>
    where
        T: LinearConstruction<Layer = L>,
    {
        if let Some(l) = self.layers.first() {
            assert_eq!(
                l.input(),
                self.in_size,
                "Layer size mismatch. First layer reports a different size than configured"
            )
        }
        T::construct(self.allocator.finish(), self.in_size, self.layers)
    }
}
