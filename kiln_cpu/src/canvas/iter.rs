// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::layer::{Layer, LayerId};
use smallvec::SmallVec;

/// Iterates over the layers a draw reaches, bottom-most first.
#[derive(Debug)]
pub(crate) struct DrawIter {
    chain: SmallVec<[LayerId; 4]>,
}

impl DrawIter {
    /// Follow the chain of layers starting at `top`.
    pub(crate) fn new(layers: &[Layer], top: LayerId) -> Self {
        let mut chain = SmallVec::new();
        let mut next = Some(top);
        while let Some(id) = next {
            let Some(layer) = layers.get(id.0) else {
                break;
            };
            chain.push(id);
            next = layer.next;
        }
        Self { chain }
    }
}

impl Iterator for DrawIter {
    type Item = LayerId;

    fn next(&mut self) -> Option<LayerId> {
        self.chain.pop()
    }
}
