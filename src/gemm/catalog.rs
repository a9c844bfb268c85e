//! Process-wide registry of GEMM solutions.
//!
//! Every solution is registered once, on first use, into a table that is
//! never mutated afterwards. Indices are assigned sequentially from 1 in
//! registration order (precision, then transpose pair, then tile), so they
//! are stable for the life of the process and across runs of the same build.
//! Index 0 is never registered: it means "let the library choose".

use std::fmt;
use std::sync::OnceLock;

use crate::gemm::precision::Precision;
use crate::gemm::problem::{BatchLayout, GemmProblem};
use crate::types::Operation;

/// Tile shape computed by one workgroup: `mt0 x mt1`, unrolled `depth_u`
/// along k per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacroTile {
    pub mt0: usize,
    pub mt1: usize,
    pub depth_u: usize,
}

#[derive(Debug, Clone, Copy)]
struct TileTemplate {
    tile: MacroTile,
    global_split_u: usize,
    exact_tile: bool,
    exact_summation: bool,
    ld_align: usize,
}

const fn template(
    mt0: usize,
    mt1: usize,
    depth_u: usize,
    global_split_u: usize,
    exact_tile: bool,
    exact_summation: bool,
    ld_align: usize,
) -> TileTemplate {
    TileTemplate {
        tile: MacroTile { mt0, mt1, depth_u },
        global_split_u,
        exact_tile,
        exact_summation,
        ld_align,
    }
}

/// Tiles registered for every precision and transpose pair.
const TEMPLATES: [TileTemplate; 8] = [
    template(16, 16, 8, 1, false, false, 1),
    template(32, 32, 8, 1, false, false, 1),
    template(64, 64, 16, 1, false, false, 1),
    template(128, 64, 16, 1, true, false, 1),
    template(64, 128, 16, 1, true, false, 1),
    template(128, 128, 32, 1, true, true, 4),
    template(64, 64, 16, 4, false, false, 1),
    template(32, 32, 8, 8, false, false, 1),
];

/// Problems whose k is at least this many times max(m, n) prefer split-K.
const SPLIT_K_RATIO: usize = 32;

/// One registered solution and the problems it accepts.
#[derive(Debug, Clone)]
pub struct SolutionEntry {
    pub index: i32,
    pub name: String,
    pub precision: Precision,
    pub trans_a: Operation,
    pub trans_b: Operation,
    pub tile: MacroTile,
    /// Number of k-partitions; above 1 the kernel needs workspace.
    pub global_split_u: usize,
    /// Requires `m % mt0 == 0 && n % mt1 == 0`.
    pub exact_tile: bool,
    /// Requires `k % depth_u == 0`.
    pub exact_summation: bool,
    /// Every leading dimension must be a multiple of this.
    pub ld_align: usize,
    /// Reads i8 operands in packed int8x4 layout.
    pub int8x4: bool,
}

impl SolutionEntry {
    pub fn is_split_k(&self) -> bool {
        self.global_split_u > 1
    }

    pub fn supports_pointer_array(&self) -> bool {
        !self.is_split_k()
    }

    /// Whether this solution can execute `p`.
    pub fn supports(&self, p: &GemmProblem) -> bool {
        if self.precision != p.precision
            || self.trans_a != p.trans_a
            || self.trans_b != p.trans_b
            || self.int8x4 != p.packed_int8x4()
        {
            return false;
        }
        if self.exact_tile && (p.m % self.tile.mt0 != 0 || p.n % self.tile.mt1 != 0) {
            return false;
        }
        if self.exact_summation && p.k % self.tile.depth_u != 0 {
            return false;
        }
        if self.ld_align > 1 && [p.lda, p.ldb, p.ldc, p.ldd].iter().any(|ld| ld % self.ld_align != 0) {
            return false;
        }
        if p.layout == BatchLayout::PointerArray && !self.supports_pointer_array() {
            return false;
        }
        if self.is_split_k() && p.k < self.global_split_u * self.tile.depth_u {
            return false;
        }
        true
    }

    /// Device workspace needed to run `p`, in bytes.
    pub fn workspace_bytes(&self, p: &GemmProblem) -> usize {
        if !self.is_split_k() {
            return 0;
        }
        self.global_split_u
            .saturating_mul(p.m)
            .saturating_mul(p.n)
            .saturating_mul(p.precision.compute_type().size_bytes())
    }

    /// Padded tile area minus useful area for `p`.
    fn wasted_area(&self, p: &GemmProblem) -> usize {
        let padded_m = p.m.div_ceil(self.tile.mt0) * self.tile.mt0;
        let padded_n = p.n.div_ceil(self.tile.mt1) * self.tile.mt1;
        padded_m * padded_n - p.m * p.n
    }
}

impl fmt::Display for SolutionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.name)
    }
}

fn solution_name(precision: Precision, ta: Operation, tb: Operation, t: &TileTemplate, int8x4: bool) -> String {
    let a = match ta {
        Operation::None => "Ailk",
        Operation::Transpose => "Alik",
        Operation::ConjugateTranspose => "AlikC",
    };
    let b = match tb {
        Operation::None => "Bljk",
        Operation::Transpose => "Bjlk",
        Operation::ConjugateTranspose => "BjlkC",
    };
    let mut name = format!(
        "Cijk_{a}_{b}_{}_MT{}x{}x{}_GSU{}",
        precision.tag(),
        t.tile.mt0,
        t.tile.mt1,
        t.tile.depth_u,
        t.global_split_u
    );
    if t.ld_align > 1 {
        name.push_str(&format!("_LDA{}", t.ld_align));
    }
    if int8x4 {
        name.push_str("_I8X4");
    }
    name.push_str(if t.exact_tile { "_E" } else { "_G" });
    name
}

fn transpose_pairs(precision: Precision) -> Vec<(Operation, Operation)> {
    let ops: &[Operation] = if precision.is_complex() {
        &[Operation::None, Operation::Transpose, Operation::ConjugateTranspose]
    } else {
        &[Operation::None, Operation::Transpose]
    };
    ops.iter()
        .flat_map(|&a| ops.iter().map(move |&b| (a, b)))
        .collect()
}

/// The immutable solution table.
#[derive(Debug)]
pub struct SolutionCatalog {
    entries: Vec<SolutionEntry>,
}

static CATALOG: OnceLock<SolutionCatalog> = OnceLock::new();

/// The process-wide catalog, built on first access.
pub fn catalog() -> &'static SolutionCatalog {
    CATALOG.get_or_init(SolutionCatalog::build)
}

/// Build the catalog eagerly. Idempotent and thread-safe.
pub fn initialize() {
    let catalog = catalog();
    log::debug!("gemm solution catalog ready: {} solutions", catalog.len());
}

impl SolutionCatalog {
    fn build() -> Self {
        let mut entries = Vec::new();
        for precision in Precision::ALL {
            let packings: &[bool] = if precision == Precision::I8I32 { &[false, true] } else { &[false] };
            for (trans_a, trans_b) in transpose_pairs(precision) {
                for &int8x4 in packings {
                    for t in &TEMPLATES {
                        let index = entries.len() as i32 + 1;
                        entries.push(SolutionEntry {
                            index,
                            name: solution_name(precision, trans_a, trans_b, t, int8x4),
                            precision,
                            trans_a,
                            trans_b,
                            tile: t.tile,
                            global_split_u: t.global_split_u,
                            exact_tile: t.exact_tile,
                            exact_summation: t.exact_summation,
                            ld_align: t.ld_align,
                            int8x4,
                        });
                    }
                }
            }
        }
        SolutionCatalog { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SolutionEntry] {
        &self.entries
    }

    /// The solution registered under `index`.
    pub fn entry(&self, index: i32) -> Option<&SolutionEntry> {
        let pos = usize::try_from(index).ok()?.checked_sub(1)?;
        self.entries.get(pos)
    }

    /// Indices of every solution that can execute `p`, ascending.
    pub fn enumerate(&self, p: &GemmProblem) -> Vec<i32> {
        self.entries
            .iter()
            .filter(|e| e.supports(p))
            .map(|e| e.index)
            .collect()
    }

    /// Indices of every solution of `precision`, ascending. With
    /// `int8x4` set only packed int8 solutions are listed, otherwise only
    /// unpacked ones.
    pub fn enumerate_by_precision(&self, precision: Precision, int8x4: bool) -> Vec<i32> {
        let int8x4 = int8x4 && precision == Precision::I8I32;
        self.entries
            .iter()
            .filter(|e| e.precision == precision && e.int8x4 == int8x4)
            .map(|e| e.index)
            .collect()
    }

    /// The solution index 0 stands for, or `None` when nothing in the
    /// catalog fits and the built-in reference kernel must run.
    pub fn default_solution(&self, p: &GemmProblem) -> Option<&SolutionEntry> {
        let candidates: Vec<&SolutionEntry> = self.entries.iter().filter(|e| e.supports(p)).collect();
        let tall_k = p.k >= SPLIT_K_RATIO * p.m.max(p.n).max(1);
        if tall_k {
            if let Some(split) = candidates
                .iter()
                .filter(|e| e.is_split_k())
                .max_by_key(|e| (e.global_split_u, std::cmp::Reverse(e.index)))
                .copied()
            {
                return Some(split);
            }
        }
        candidates
            .into_iter()
            .filter(|e| !e.is_split_k())
            .min_by_key(|e| {
                let area = e.tile.mt0 * e.tile.mt1;
                (e.wasted_area(p), std::cmp::Reverse(area), e.index)
            })
    }
}
