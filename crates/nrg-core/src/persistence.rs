//! Binary persistence for the working-directory blobs the two-pass solver
//! exchanges between its forward and backward sweeps: per-step
//! transformation matrices (`unitary<N>`) and density matrices
//! (`rho<N>`/`rhoFDM<N>`).
//!
//! Fail-fast: any I/O or decode error is wrapped with the path that failed
//! so the caller's log line names the broken file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::density_matrix::DensityMatrixSet;
use crate::diag_state::DiagState;
use crate::error::{NrgError, Result};
use crate::invariant::Invariant;
use crate::scalar::{Matrix, Scalar};
use crate::spectrum::{ColumnBlock, Spectrum};

#[derive(Serialize, Deserialize)]
struct TransformationRecord<T> {
    invariant: Invariant,
    v_orig: Vec<f64>,
    eigenvectors: Matrix<T>,
    egs: f64,
    v_zero: Vec<f64>,
    abs_e: Vec<f64>,
    abs_e_g: Vec<f64>,
    abs_e_n: Vec<f64>,
    kept: usize,
    dim: usize,
    blocks: Vec<(Invariant, usize, usize)>,
}

fn to_record<T: Scalar>(invariant: &Invariant, spec: &Spectrum<T>) -> TransformationRecord<T> {
    TransformationRecord {
        invariant: invariant.clone(),
        v_orig: spec.v_orig.clone(),
        eigenvectors: spec.eigenvectors.clone(),
        egs: spec.egs,
        v_zero: spec.v_zero.clone(),
        abs_e: spec.abs_e.clone(),
        abs_e_g: spec.abs_e_g.clone(),
        abs_e_n: spec.abs_e_n.clone(),
        kept: spec.kept,
        dim: spec.dim,
        blocks: spec
            .blocks
            .iter()
            .map(|b| (b.ancestor.clone(), b.offset, b.len))
            .collect(),
    }
}

fn from_record<T: Scalar>(record: TransformationRecord<T>) -> (Invariant, Spectrum<T>) {
    let mut spec = Spectrum::new(record.v_orig, record.eigenvectors, record.dim);
    spec.egs = record.egs;
    spec.v_zero = record.v_zero;
    spec.abs_e = record.abs_e;
    spec.abs_e_g = record.abs_e_g;
    spec.abs_e_n = record.abs_e_n;
    spec.kept = record.kept;
    spec.blocks = record
        .blocks
        .into_iter()
        .map(|(ancestor, offset, len)| ColumnBlock {
            ancestor,
            offset,
            len,
        })
        .collect();
    (record.invariant, spec)
}

pub fn dump_transformations<T>(path: &Path, state: &DiagState<T>) -> Result<()>
where
    T: Scalar + Serialize,
{
    let file = File::create(path).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    let mut writer = BufWriter::new(file);
    let records: Vec<TransformationRecord<T>> = state
        .spectra
        .iter()
        .map(|(inv, spec)| to_record(inv, spec))
        .collect();
    bincode::serialize_into(&mut writer, &records)?;
    Ok(())
}

pub fn load_transformations<T>(path: &Path) -> Result<DiagState<T>>
where
    T: Scalar + DeserializeOwned,
{
    let file = File::open(path).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    let reader = BufReader::new(file);
    let records: Vec<TransformationRecord<T>> = bincode::deserialize_from(reader)?;
    let mut state = DiagState::new();
    for record in records {
        let (invariant, spec) = from_record(record);
        state.insert(invariant, spec);
    }
    Ok(state)
}

#[derive(Serialize, Deserialize)]
struct DensityMatrixRecord<T> {
    invariant: Invariant,
    block: Matrix<T>,
}

pub fn dump_density_matrix<T>(path: &Path, rho: &DensityMatrixSet<T>) -> Result<()>
where
    T: Scalar + Serialize,
{
    let file = File::create(path).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    let mut writer = BufWriter::new(file);
    let records: Vec<DensityMatrixRecord<T>> = rho
        .blocks
        .iter()
        .map(|(invariant, block)| DensityMatrixRecord {
            invariant: invariant.clone(),
            block: block.clone(),
        })
        .collect();
    bincode::serialize_into(&mut writer, &records)?;
    Ok(())
}

pub fn load_density_matrix<T>(path: &Path) -> Result<DensityMatrixSet<T>>
where
    T: Scalar + DeserializeOwned,
{
    let file = File::open(path).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    let reader = BufReader::new(file);
    let records: Vec<DensityMatrixRecord<T>> = bincode::deserialize_from(reader)?;
    let mut blocks = BTreeMap::new();
    for record in records {
        blocks.insert(record.invariant, record.block);
    }
    Ok(DensityMatrixSet { blocks })
}
