//! Per-well linear system blocks and their Schur-complement elimination.
//!
//! For one well with connections `c` the coupled system reads
//!
//! ```text
//! [ A   B ] [x ]   [r  ]
//! [ C   D ] [xw] = [r_w]
//! ```
//!
//! where `B_c` couples the reservoir equations of connection cell `c` to the
//! well unknowns, `C_c` couples the well equations to that cell's unknowns
//! and `D` is the well's own Jacobian. The reduced reservoir system is
//! `(A - B D⁻¹ C) x = r - B D⁻¹ r_w` and the well unknowns are recovered as
//! `xw = D⁻¹ (r_w - C x)`. The inverse of `D` is computed once per assembly
//! and reused by every product so all of them stay mutually consistent.

use crate::error::{WellError, WellResult};
use nalgebra::{Matrix3, Vector3};
use wf_core::NUM_EQ;

/// Dense block of one equation set by one variable set.
pub type Block = Matrix3<f64>;
/// Dense per-cell or per-well vector.
pub type BlockVector = Vector3<f64>;

const _: () = assert!(NUM_EQ == 3);

/// One explicit Schur-complement block `B_i D⁻¹ C_j`, to be subtracted from
/// the reservoir matrix at `(row_cell, col_cell)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SchurEntry {
    pub row_cell: usize,
    pub col_cell: usize,
    pub block: Block,
}

#[derive(Clone, Debug)]
pub struct WellBlocks {
    cells: Vec<usize>,
    b: Vec<Block>,
    c: Vec<Block>,
    d: Block,
    residual: BlockVector,
    inv_d: Option<Block>,
}

impl WellBlocks {
    /// Empty blocks for a well connected to `cells`, in connection order.
    pub fn new(cells: Vec<usize>) -> Self {
        let n = cells.len();
        Self {
            cells,
            b: vec![Block::zeros(); n],
            c: vec![Block::zeros(); n],
            d: Block::zeros(),
            residual: BlockVector::zeros(),
            inv_d: None,
        }
    }

    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn b_mut(&mut self, conn: usize) -> &mut Block {
        self.inv_d = None;
        &mut self.b[conn]
    }

    pub fn c_mut(&mut self, conn: usize) -> &mut Block {
        self.inv_d = None;
        &mut self.c[conn]
    }

    pub fn d_mut(&mut self) -> &mut Block {
        self.inv_d = None;
        &mut self.d
    }

    pub fn residual_mut(&mut self) -> &mut BlockVector {
        &mut self.residual
    }

    pub fn b(&self, conn: usize) -> &Block {
        &self.b[conn]
    }

    pub fn c(&self, conn: usize) -> &Block {
        &self.c[conn]
    }

    pub fn d(&self) -> &Block {
        &self.d
    }

    pub fn residual(&self) -> &BlockVector {
        &self.residual
    }

    /// Invert `D`. A singular or non-finite well block is fatal for the step.
    pub fn eliminate(&mut self) -> WellResult<()> {
        if self.d.iter().any(|v| !v.is_finite()) {
            return Err(WellError::numerical("non-finite well Jacobian"));
        }
        let inv = self
            .d
            .try_inverse()
            .ok_or_else(|| WellError::numerical("singular well Jacobian"))?;
        if inv.iter().any(|v| !v.is_finite()) {
            return Err(WellError::numerical("ill-conditioned well Jacobian"));
        }
        self.inv_d = Some(inv);
        Ok(())
    }

    pub fn inv_d(&self) -> WellResult<&Block> {
        self.inv_d
            .as_ref()
            .ok_or_else(|| WellError::logic("well blocks used before elimination"))
    }

    fn cell_of(&self, conn: usize, len: usize) -> WellResult<usize> {
        let cell = self.cells[conn];
        if cell >= len {
            return Err(WellError::logic(format!(
                "connection cell {cell} outside a global vector of {len} cells"
            )));
        }
        Ok(cell)
    }

    /// `r -= B D⁻¹ r_w`
    pub fn apply_residual(&self, r: &mut [BlockVector]) -> WellResult<()> {
        let inv_d_rw = self.inv_d()? * self.residual;
        for conn in 0..self.cells.len() {
            let cell = self.cell_of(conn, r.len())?;
            r[cell] -= self.b[conn] * inv_d_rw;
        }
        Ok(())
    }

    /// `Σ_c C_c x[cell_c]`
    fn c_times(&self, x: &[BlockVector]) -> WellResult<BlockVector> {
        let mut cx = BlockVector::zeros();
        for conn in 0..self.cells.len() {
            let cell = self.cell_of(conn, x.len())?;
            cx += self.c[conn] * x[cell];
        }
        Ok(cx)
    }

    /// `ax -= B D⁻¹ C x`
    pub fn apply(&self, x: &[BlockVector], ax: &mut [BlockVector]) -> WellResult<()> {
        self.apply_scaled(1.0, x, ax)
    }

    /// `ax -= alpha B D⁻¹ C x`
    pub fn apply_scaled(&self, alpha: f64, x: &[BlockVector], ax: &mut [BlockVector]) -> WellResult<()> {
        let inv_d_cx = self.inv_d()? * self.c_times(x)?;
        for conn in 0..self.cells.len() {
            let cell = self.cell_of(conn, ax.len())?;
            ax[cell] -= (self.b[conn] * inv_d_cx) * alpha;
        }
        Ok(())
    }

    /// Well update `D⁻¹ (r_w - C x)` from a reservoir update `x`.
    pub fn recover(&self, x: &[BlockVector]) -> WellResult<BlockVector> {
        Ok(self.inv_d()? * (self.residual - self.c_times(x)?))
    }

    /// Well update `D⁻¹ r_w` with the reservoir held fixed.
    pub fn well_update(&self) -> WellResult<BlockVector> {
        Ok(self.inv_d()? * self.residual)
    }

    /// Explicit blocks `B_i D⁻¹ C_j` for every connection pair.
    pub fn schur_entries(&self) -> WellResult<Vec<SchurEntry>> {
        let inv_d = self.inv_d()?;
        let n = self.cells.len();
        let mut out = Vec::with_capacity(n * n);
        for i in 0..n {
            let b_inv_d = self.b[i] * inv_d;
            for j in 0..n {
                out.push(SchurEntry {
                    row_cell: self.cells[i],
                    col_cell: self.cells[j],
                    block: b_inv_d * self.c[j],
                });
            }
        }
        Ok(out)
    }
}
