use std::io::{self, Write};
use std::mem;

use ndarray::{Array2, ArrayView2};

use crate::error::{GisError, Result};
use crate::event::Event;
use crate::probability;

pub(crate) const MAGIC: &[u8; 4] = b"lGIS";
pub(crate) const VERSION: u32 = 1;
/// magic, header size, version, four u32 sizes, C⁻¹ and the smoothing floor
pub(crate) const HEADER_SIZE: usize = 4 + 4 + 4 + 4 * 4 + 8 + 8;

#[inline]
pub(crate) fn unpack_u32(buf: &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(GisError::InvalidModel(
            "not enough data for unpacking u32".to_string(),
        ));
    }
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

#[inline]
fn unpack_f64(buf: &[u8]) -> Result<f64> {
    if buf.len() < 8 {
        return Err(GisError::InvalidModel(
            "not enough data for unpacking f64".to_string(),
        ));
    }
    Ok(f64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ]))
}

/// A trained maximum-entropy model
///
/// Holds the dense `num_predicates × num_labels` parameter matrix, the
/// reciprocal of the scaling constant C, and the predicate and label IDs seen
/// during training. The model is immutable; scoring uses the same probability
/// routine as training.
#[derive(Debug, Clone, PartialEq)]
pub struct GisModel {
    c_inverse: f64,
    parameters: Array2<f64>,
    predicates: Vec<u32>,
    labels: Vec<u32>,
    smoothing_floor: f64,
}

impl GisModel {
    /// Assemble a model, checking that every ID fits the parameter matrix.
    pub fn new(
        c_inverse: f64,
        parameters: Array2<f64>,
        mut predicates: Vec<u32>,
        mut labels: Vec<u32>,
        smoothing_floor: f64,
    ) -> Result<Self> {
        let (num_predicates, num_labels) = parameters.dim();
        predicates.sort_unstable();
        predicates.dedup();
        labels.sort_unstable();
        labels.dedup();
        if let Some(&id) = predicates.iter().find(|&&p| p as usize >= num_predicates) {
            return Err(GisError::UnknownId {
                kind: "predicate",
                id,
                bound: num_predicates,
            });
        }
        if let Some(&id) = labels.iter().find(|&&l| l as usize >= num_labels) {
            return Err(GisError::UnknownId {
                kind: "label",
                id,
                bound: num_labels,
            });
        }
        Ok(Self {
            c_inverse,
            parameters,
            predicates,
            labels,
            smoothing_floor,
        })
    }

    /// Reciprocal of the GIS scaling constant
    pub fn c_inverse(&self) -> f64 {
        self.c_inverse
    }

    pub fn parameters(&self) -> ArrayView2<'_, f64> {
        self.parameters.view()
    }

    /// Weight of a (predicate, label) pair
    pub fn weight(&self, predicate: u32, label: u32) -> Option<f64> {
        self.parameters
            .get((predicate as usize, label as usize))
            .copied()
    }

    /// Predicate IDs seen during training, ascending
    pub fn predicates(&self) -> &[u32] {
        &self.predicates
    }

    /// Label IDs seen during training, ascending
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn num_predicates(&self) -> usize {
        self.parameters.nrows()
    }

    pub fn num_labels(&self) -> usize {
        self.parameters.ncols()
    }

    pub fn smoothing_floor(&self) -> f64 {
        self.smoothing_floor
    }

    fn check_event(&self, event: &Event) -> Result<()> {
        let bound = self.num_predicates();
        match event.predicates().iter().find(|&&p| p as usize >= bound) {
            Some(&id) => Err(GisError::UnknownId {
                kind: "predicate",
                id,
                bound,
            }),
            None => Ok(()),
        }
    }

    /// Conditional distribution over labels for `event`.
    ///
    /// The event's own label is ignored.
    pub fn probabilities(&self, event: &Event) -> Result<Vec<f64>> {
        self.check_event(event)?;
        Ok(probability::score_event(
            event,
            self.parameters.view(),
            self.smoothing_floor,
        ))
    }

    /// Most probable label for `event`; ties go to the lowest ID.
    ///
    /// Fails with [`GisError::InvalidModel`] when the model has no labels or
    /// scores every label as NaN.
    pub fn classify(&self, event: &Event) -> Result<u32> {
        let probs = self.probabilities(event)?;
        let mut best: Option<(usize, f64)> = None;
        for (label, &p) in probs.iter().enumerate() {
            if p.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if p <= top => {}
                _ => best = Some((label, p)),
            }
        }
        match best {
            Some((label, _)) => Ok(label as u32),
            None if probs.is_empty() => {
                Err(GisError::InvalidModel("model has no labels".to_string()))
            }
            None => Err(GisError::InvalidModel(
                "every label probability is NaN".to_string(),
            )),
        }
    }

    /// Decode a model written by [`ModelWriter`](crate::train::ModelWriter).
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(GisError::InvalidModel("invalid model format".to_string()));
        }
        if &buf[0..4] != MAGIC {
            return Err(GisError::InvalidModel(
                "invalid file format, magic mismatch".to_string(),
            ));
        }
        let mut index = 4;
        let header_size = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let version = unpack_u32(&buf[index..])?;
        index += 4;
        if header_size != HEADER_SIZE || version != VERSION {
            return Err(GisError::InvalidModel(format!(
                "unsupported header (size {}, version {})",
                header_size, version
            )));
        }
        let num_predicates = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let num_labels = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let num_predicate_ids = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let num_label_ids = unpack_u32(&buf[index..])? as usize;
        index += 4;
        let c_inverse = unpack_f64(&buf[index..])?;
        index += 8;
        let smoothing_floor = unpack_f64(&buf[index..])?;
        index += 8;

        let expected = num_predicates
            .checked_mul(num_labels)
            .and_then(|cells| cells.checked_mul(mem::size_of::<f64>()))
            .and_then(|n| n.checked_add(4 * (num_predicate_ids + num_label_ids)))
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or_else(|| GisError::InvalidModel("model sizes overflow".to_string()))?;
        if buf.len() != expected {
            return Err(GisError::InvalidModel(format!(
                "expected {} bytes, found {}",
                expected,
                buf.len()
            )));
        }

        let mut predicates = Vec::with_capacity(num_predicate_ids);
        for _ in 0..num_predicate_ids {
            predicates.push(unpack_u32(&buf[index..])?);
            index += 4;
        }
        let mut labels = Vec::with_capacity(num_label_ids);
        for _ in 0..num_label_ids {
            labels.push(unpack_u32(&buf[index..])?);
            index += 4;
        }
        let mut weights = Vec::with_capacity(num_predicates * num_labels);
        for _ in 0..num_predicates * num_labels {
            weights.push(unpack_f64(&buf[index..])?);
            index += 8;
        }
        let parameters = Array2::from_shape_vec((num_predicates, num_labels), weights)
            .map_err(|e| GisError::InvalidModel(e.to_string()))?;

        Self::new(c_inverse, parameters, predicates, labels, smoothing_floor)
    }

    /// Print the model in human-readable format
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "MODEL = {{")?;
        writeln!(w, "  num_predicates: {}", self.num_predicates())?;
        writeln!(w, "  num_labels: {}", self.num_labels())?;
        writeln!(w, "  c_inverse: {:.6}", self.c_inverse)?;
        writeln!(w, "  smoothing_floor: {:.6}", self.smoothing_floor)?;
        writeln!(w, "}}\n")?;
        writeln!(w, "LABELS = {{")?;
        for label in &self.labels {
            writeln!(w, "  {:>5}", label)?;
        }
        writeln!(w, "}}\n")?;
        writeln!(w, "PARAMETERS = {{")?;
        for &p in &self.predicates {
            for &l in &self.labels {
                let weight = self.parameters[[p as usize, l as usize]];
                writeln!(w, "  {} --> {}: {:.6}", p, l, weight)?;
            }
        }
        writeln!(w, "}}\n")?;
        Ok(())
    }
}
