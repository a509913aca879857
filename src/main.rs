use anyhow::{bail, Context};
use prjunnamed_netlist::Design;
use std::{fs::File, io::BufWriter, io::Write};
use xyz_lutmap::aig::{Aig, Lit};
use xyz_lutmap::import::{import_design, ImportedNetwork};
use xyz_lutmap::{perform_mapping, MappedNetwork, MapperParams};

fn read_input(filename: &str) -> anyhow::Result<Design> {
    if filename.ends_with(".uir") {
        let text = std::fs::read_to_string(filename).with_context(|| format!("reading {filename}"))?;
        prjunnamed_netlist::parse(None, &text).map_err(|err| anyhow::anyhow!("parsing {filename}: {err:?}"))
    } else if filename.ends_with(".json") {
        let mut file = File::open(filename).with_context(|| format!("opening {filename}"))?;
        let designs = prjunnamed_yosys_json::import(None, &mut file)
            .map_err(|err| anyhow::anyhow!("importing {filename}: {err:?}"))?;
        if designs.len() != 1 {
            bail!("on Yosys JSON import a single module is expected, got {}", designs.len());
        }
        Ok(designs.into_values().next().unwrap())
    } else {
        bail!("unrecognized file type: {filename}")
    }
}

fn node_name(network: &ImportedNetwork, aig: &Aig, lit: Lit) -> String {
    let base = if lit.node() == 0 {
        "0".to_owned()
    } else if aig.is_ci(lit.node()) {
        network.ci_names[aig.cio_index(lit.node())].clone()
    } else {
        format!("n{}", lit.node())
    };
    if lit.is_complement() {
        format!("!{base}")
    } else {
        base
    }
}

// one line per LUT, `root: leaves [= function]`, then one line per output
fn write_cover(output: &mut impl Write, network: &ImportedNetwork, mapped: &MappedNetwork) -> std::io::Result<()> {
    let aig = &mapped.aig;
    let mapping = &mapped.mapping;
    for root in mapping.iter_luts() {
        let leaves: Vec<String> = mapping
            .lut_leaves(root)
            .map(|leaf| node_name(network, aig, Lit::new(leaf, false)))
            .collect();
        write!(output, "n{root}: {}", leaves.join(" "))?;
        if let Some(function) = mapping.lut_function(root) {
            write!(output, " = {}", xyz_lutmap::truth::to_hex(function, leaves.len()))?;
        }
        writeln!(output)?;
    }
    for (co, name) in network.co_names.iter().enumerate() {
        let mut driver = aig.co_driver(co);
        while aig.is_buf(driver.node()) {
            driver = aig.fanin0(driver.node()).not_cond(driver.is_complement());
        }
        writeln!(output, "{name} = {}", node_name(network, aig, driver))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let mut input_fn = String::new();
    let mut output_fn = String::new();
    let mut params = MapperParams::default();
    let mut no_edge = false;
    let mut no_coarsen = false;
    let mut decompose = false;
    let mut no_lower_arith = false;
    let mut verbose = false;

    {
        let mut parser = argparse::ArgumentParser::new();
        parser.set_description("Delay and area oriented LUT mapper");
        parser
            .refer(&mut input_fn)
            .add_argument("INPUT", argparse::Store, "Input file (.uir or Yosys .json)")
            .required();
        parser
            .refer(&mut output_fn)
            .add_option(&["-o", "--output"], argparse::Store, "Write the LUT cover here instead of stdout");
        parser
            .refer(&mut params.lut_size)
            .add_option(&["-K", "--lut-size"], argparse::Store, "LUT size (2..13)");
        parser
            .refer(&mut params.cut_num)
            .add_option(&["-C", "--cut-num"], argparse::Store, "Cuts kept per node (2..32)");
        parser
            .refer(&mut params.rounds)
            .add_option(&["--rounds"], argparse::Store, "Delay and area-flow rounds");
        parser
            .refer(&mut params.rounds_ela)
            .add_option(&["--rounds-ela"], argparse::Store, "Exact-area rounds");
        parser.refer(&mut params.relax_ratio).add_option(
            &["--relax-ratio"],
            argparse::Store,
            "Relax the delay target by this many percent",
        );
        parser.refer(&mut params.area_tuner).add_option(
            &["--area-tuner"],
            argparse::Store,
            "Extra LUT cost added to the edge count in edge mode",
        );
        parser.refer(&mut params.delay_target).add_option(
            &["--delay-target"],
            argparse::StoreOption,
            "Target depth in LUT levels",
        );
        parser.refer(&mut no_edge).add_option(
            &["--no-edge"],
            argparse::StoreTrue,
            "Count LUTs rather than edges as area",
        );
        parser.refer(&mut params.use_mux7).add_option(
            &["--mux7"],
            argparse::StoreTrue,
            "Combine two LUTs under a MUX into one slice",
        );
        parser.refer(&mut params.power).add_option(
            &["--power"],
            argparse::StoreTrue,
            "Add switching activity to the area cost",
        );
        parser.refer(&mut params.cut_min).add_option(
            &["--cut-min"],
            argparse::StoreTrue,
            "Compute cut functions and drop redundant leaves",
        );
        parser.refer(&mut no_coarsen).add_option(
            &["--no-coarsen"],
            argparse::StoreTrue,
            "Do not collapse AND-level MUX and XOR structures",
        );
        parser.refer(&mut params.do_average).add_option(
            &["--average"],
            argparse::StoreTrue,
            "Derive each output's required time from its own arrival",
        );
        parser.refer(&mut decompose).add_option(
            &["--aig"],
            argparse::StoreTrue,
            "Decompose XOR and MUX cells into AND nodes on import",
        );
        parser.refer(&mut no_lower_arith).add_option(
            &["--no-lower-arith"],
            argparse::StoreTrue,
            "Disable lowering of arithmetic",
        );
        parser
            .refer(&mut verbose)
            .add_option(&["-v", "--verbose"], argparse::StoreTrue, "Verbose logging");
        parser.parse_args_or_exit();
    }
    params.opt_edge = !no_edge;
    params.coarsen = !no_coarsen;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" }))
        .init();

    let mut design = read_input(&input_fn)?;
    prjunnamed_generic::unname(&mut design);

    eprintln!("Optimizing...");
    prjunnamed_generic::decision(&mut design);
    prjunnamed_generic::canonicalize(&mut design);

    if no_lower_arith {
        design.rewrite(&[&prjunnamed_generic::LowerLt, &prjunnamed_generic::LowerShift]);
    } else {
        design.rewrite(&[
            &prjunnamed_generic::LowerLt,
            &prjunnamed_generic::LowerMul,
            &prjunnamed_generic::LowerShift,
        ]);
    }
    design.rewrite(&[
        &prjunnamed_generic::LowerEq,
        &prjunnamed_generic::LowerMux,
        &prjunnamed_generic::SimpleAigOpt,
        &prjunnamed_generic::Normalize,
    ]);

    prjunnamed_generic::chain_rebalance(&mut design);
    prjunnamed_generic::canonicalize(&mut design);
    prjunnamed_generic::tree_rebalance(&mut design);
    design.compact();

    eprintln!("Importing...");
    // MUX nodes need at least 3-input LUTs
    let network = import_design(&design, !decompose && params.lut_size >= 3)?;

    eprintln!("Mapping...");
    let mapped = perform_mapping(&network.aig, &params, None)?;

    eprintln!("Writing result..");
    if output_fn.is_empty() {
        let stdout = std::io::stdout();
        write_cover(&mut stdout.lock(), &network, &mapped)?;
    } else {
        let mut output = BufWriter::new(File::create(&output_fn).with_context(|| format!("creating {output_fn}"))?);
        write_cover(&mut output, &network, &mapped)?;
        output.flush()?;
    }

    eprintln!(
        "{} LUTs, {} edges, depth {}",
        mapped.mapping.lut_count(),
        mapped.mapping.edge_count(),
        mapped.mapping.depth(&mapped.aig)
    );
    Ok(())
}
