use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::model::{GisModel, HEADER_SIZE, MAGIC, VERSION};

/// Write a trained model as a little-endian numeric payload
///
/// Layout: header (magic `lGIS`, header size, version, matrix rows and
/// columns, number of predicate and label IDs, C⁻¹, smoothing floor), then the
/// predicate IDs, the label IDs, and the parameter matrix in row-major order.
pub struct ModelWriter;

impl ModelWriter {
    /// Write model to file
    pub fn write(filename: &Path, model: &GisModel) -> Result<()> {
        let file = File::create(filename)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(&mut writer, model)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize model into a byte buffer
    pub fn to_bytes(model: &GisModel) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(
            HEADER_SIZE
                + 4 * (model.predicates().len() + model.labels().len())
                + 8 * model.num_predicates() * model.num_labels(),
        );
        Self::write_to(&mut buf, model)?;
        Ok(buf)
    }

    /// Write model to any writer
    pub fn write_to<W: Write>(w: &mut W, model: &GisModel) -> Result<()> {
        let to_u32 = |n: usize| -> io::Result<u32> {
            u32::try_from(n).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "model size exceeds u32::MAX")
            })
        };

        w.write_all(MAGIC)?;
        w.write_all(&to_u32(HEADER_SIZE)?.to_le_bytes())?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&to_u32(model.num_predicates())?.to_le_bytes())?;
        w.write_all(&to_u32(model.num_labels())?.to_le_bytes())?;
        w.write_all(&to_u32(model.predicates().len())?.to_le_bytes())?;
        w.write_all(&to_u32(model.labels().len())?.to_le_bytes())?;
        w.write_all(&model.c_inverse().to_le_bytes())?;
        w.write_all(&model.smoothing_floor().to_le_bytes())?;

        for id in model.predicates() {
            w.write_all(&id.to_le_bytes())?;
        }
        for id in model.labels() {
            w.write_all(&id.to_le_bytes())?;
        }
        // iterates in logical row-major order regardless of memory layout
        for weight in model.parameters().iter() {
            w.write_all(&weight.to_le_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_write_and_read_back() {
        let model = GisModel::new(
            0.25,
            array![[0.5, -0.5, 1.5], [2.0, 0.0, -3.25]],
            vec![0, 1],
            vec![0, 2],
            0.1,
        )
        .unwrap();
        let buf = ModelWriter::to_bytes(&model).unwrap();
        assert_eq!(&buf[..4], b"lGIS");
        assert_eq!(buf.len(), HEADER_SIZE + 4 * 4 + 8 * 6);

        let loaded = GisModel::from_bytes(&buf).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let model = GisModel::new(1.0, array![[1.0, 2.0]], vec![0], vec![0, 1], 0.1).unwrap();
        let buf = ModelWriter::to_bytes(&model).unwrap();
        assert!(GisModel::from_bytes(&buf[..buf.len() - 1]).is_err());
    }
}
