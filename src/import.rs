// conversion of a prjunnamed netlist into the mapper's AIG
use crate::aig::{Aig, Lit};
use crate::error::{MapError, Result};
use prjunnamed_netlist::{Cell, ControlNet, Design, Net};
use std::collections::HashMap;

/// Combinational logic of a design, cut at every cell the mapper does not
/// understand.
///
/// Design inputs and outputs of opaque cells (flip-flops, memories, target
/// cells) become CIs. Design outputs, named nets and inputs of opaque cells
/// become COs. Names are kept in CI/CO order.
pub struct ImportedNetwork {
    pub aig: Aig,
    pub ci_names: Vec<String>,
    pub co_names: Vec<String>,
}

fn bit_name(name: &str, width: usize, idx: usize) -> String {
    if width == 1 {
        name.to_owned()
    } else {
        format!("{name}[{idx}]")
    }
}

fn is_logic(cell: &Cell) -> bool {
    matches!(
        cell,
        Cell::And(_, _) | Cell::Aig(_, _) | Cell::Or(_, _) | Cell::Xor(_, _) | Cell::Mux(_, _, _) | Cell::Not(_)
    )
}

struct Importer {
    aig: Aig,
    lits: HashMap<Net, Lit>,
    native: bool,
}

impl Importer {
    fn lit(&self, net: Net) -> Result<Lit> {
        if net == Net::ONE {
            return Ok(Lit::TRUE);
        }
        if net == Net::ZERO || net == Net::UNDEF {
            return Ok(Lit::FALSE);
        }
        self.lits
            .get(&net)
            .copied()
            .ok_or_else(|| MapError::DanglingNet(format!("{net:?}")))
    }

    fn control(&self, cnet: ControlNet) -> Result<Lit> {
        Ok(self.lit(cnet.net())?.not_cond(cnet.is_negative()))
    }

    fn xor(&mut self, a: Lit, b: Lit) -> Lit {
        if self.native {
            self.aig.xor(a, b)
        } else {
            self.aig.xor_aig(a, b)
        }
    }

    fn mux(&mut self, s: Lit, a: Lit, b: Lit) -> Lit {
        if self.native {
            self.aig.mux(s, a, b)
        } else {
            self.aig.mux_aig(s, a, b)
        }
    }

    fn decode(&mut self, cell: &Cell, idx: usize) -> Result<Lit> {
        Ok(match cell {
            Cell::And(arg1, arg2) => {
                let (a, b) = (self.lit(arg1[idx])?, self.lit(arg2[idx])?);
                self.aig.and(a, b)
            }
            Cell::Aig(arg1, arg2) => {
                let (a, b) = (self.control(*arg1)?, self.control(*arg2)?);
                self.aig.and(a, b)
            }
            Cell::Or(arg1, arg2) => {
                let (a, b) = (self.lit(arg1[idx])?, self.lit(arg2[idx])?);
                self.aig.or(a, b)
            }
            Cell::Xor(arg1, arg2) => {
                let (a, b) = (self.lit(arg1[idx])?, self.lit(arg2[idx])?);
                self.xor(a, b)
            }
            Cell::Mux(s, arg1, arg2) => {
                let s = self.lit(*s)?;
                let (a, b) = (self.lit(arg1[idx])?, self.lit(arg2[idx])?);
                self.mux(s, a, b)
            }
            Cell::Not(arg) => !self.lit(arg[idx])?,
            _ => unreachable!(),
        })
    }
}

/// Builds the AIG of `design`. With `native` unset, XOR and MUX cells are
/// decomposed into AND nodes.
pub fn import_design(design: &Design, native: bool) -> Result<ImportedNetwork> {
    let mut importer = Importer {
        aig: Aig::new(),
        lits: HashMap::new(),
        native,
    };
    let mut ci_names = Vec::new();

    // boundary outputs first, opaque cells may feed logic that precedes
    // them in topological order
    let mut opaque = 0;
    for cell in design.iter_cells_topo() {
        let (name, boundary) = match &*cell.get() {
            Cell::Input(name, _) => (name.clone(), true),
            Cell::Output(_, _) | Cell::Name(_, _) | Cell::Debug(_, _) => continue,
            other if is_logic(other) => continue,
            _ => {
                opaque += 1;
                (format!("$opaque{opaque}"), false)
            }
        };
        let output = cell.output();
        for (idx, net) in output.iter().enumerate() {
            let lit = importer.aig.add_ci();
            importer.lits.insert(net, lit);
            ci_names.push(if boundary {
                bit_name(&name, output.len(), idx)
            } else {
                format!("{name}.out[{idx}]")
            });
        }
    }

    let mut cos: Vec<(String, Net)> = Vec::new();
    opaque = 0;
    for cell in design.iter_cells_topo() {
        let cell_ref = cell.get();
        match &*cell_ref {
            Cell::Input(_, _) | Cell::Debug(_, _) => {}
            Cell::Output(name, value) | Cell::Name(name, value) => {
                for (idx, net) in value.iter().enumerate() {
                    cos.push((bit_name(name, value.len(), idx), net));
                }
            }
            logic if is_logic(logic) => {
                for (idx, net) in cell.output().iter().enumerate() {
                    let lit = importer.decode(logic, idx)?;
                    importer.lits.insert(net, lit);
                }
            }
            _ => {
                opaque += 1;
                let mut idx = 0;
                cell.visit(|net| {
                    cos.push((format!("$opaque{opaque}.in[{idx}]"), net));
                    idx += 1;
                });
            }
        }
    }

    let mut co_names = Vec::with_capacity(cos.len());
    for (name, net) in cos {
        let driver = importer.lit(net)?;
        importer.aig.add_co(driver);
        co_names.push(name);
    }

    log::debug!(
        "imported {} CIs, {} COs, {} gates",
        ci_names.len(),
        co_names.len(),
        importer.aig.num_internal()
    );
    Ok(ImportedNetwork {
        aig: importer.aig,
        ci_names,
        co_names,
    })
}
