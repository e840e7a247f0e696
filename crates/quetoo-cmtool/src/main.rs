// quetoo-cmtool - loads a map and runs collision queries against it
//
//   quetoo-cmtool [+set name value ...] <command> [args]
//
//   info      <map>
//   contents  <map> x y z [*N]
//   trace     <map> sx sy sz ex ey ez [minx miny minz maxx maxy maxz] [*N]
//   leafs     <map> minx miny minz maxx maxy maxz
//   build-box <out> minx miny minz maxx maxy maxz

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use quetoo_collision::{
    cm_load_bsp_model_with, BspBuilder, ChildRef, CmConfig, CmError, CollisionModel,
};
use quetoo_common::cvar::CvarContext;
use quetoo_common::q_shared::{Contents, Vec3, MASK_ALL};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum ToolError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("bad number {0:?}")]
    BadNumber(String),

    #[error("couldn't write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cm(#[from] CmError),
}

type Result<T> = std::result::Result<T, ToolError>;

const USAGE: &str = "quetoo-cmtool [+set name value ...] info|contents|trace|leafs|build-box <map> ...";

fn init_logging(cvars: &CvarContext) {
    let level = if cvars.variable_value("developer") != 0.0 {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_f32(s: &str) -> Result<f32> {
    s.parse().map_err(|_| ToolError::BadNumber(s.to_string()))
}

fn parse_vec3(args: &[String]) -> Result<Vec3> {
    Ok([parse_f32(&args[0])?, parse_f32(&args[1])?, parse_f32(&args[2])?])
}

fn load(path: &str, config: &CmConfig) -> Result<(Arc<CollisionModel>, u32)> {
    let loaded = cm_load_bsp_model_with(Some(Path::new(path)), config)?;
    // only `None` unloads, so a path always yields a model
    loaded.ok_or(ToolError::Usage(USAGE))
}

/// Head node of the world, or of the inline model named `*N`.
fn head_node(cm: &CollisionModel, model: Option<&str>) -> Result<ChildRef> {
    match model {
        Some(name) => Ok(cm.model(name)?.head_node),
        None => Ok(cm.world_model().head_node),
    }
}

const TRACE_USAGE: &str = "trace <map> sx sy sz ex ey ez [minx miny minz maxx maxy maxz] [*N]";

#[derive(Debug, PartialEq)]
struct TraceArgs {
    map: String,
    start: Vec3,
    end: Vec3,
    mins: Vec3,
    maxs: Vec3,
    model: Option<String>,
}

/// Splits the `trace` arguments. The box is all six values or none.
fn parse_trace_args(args: &[String]) -> Result<TraceArgs> {
    let (args, model) = match args.split_last() {
        Some((last, rest)) if last.starts_with('*') => (rest, Some(last.clone())),
        _ => (args, None),
    };

    let (mins, maxs) = match args.len() {
        7 => ([0.0; 3], [0.0; 3]),
        13 => (parse_vec3(&args[7..10])?, parse_vec3(&args[10..13])?),
        _ => return Err(ToolError::Usage(TRACE_USAGE)),
    };

    Ok(TraceArgs {
        map: args[0].clone(),
        start: parse_vec3(&args[1..4])?,
        end: parse_vec3(&args[4..7])?,
        mins,
        maxs,
        model,
    })
}

fn log_stats(cm: &CollisionModel) {
    if cm.config().trace_stats {
        let (traces, brush_tests, point_contents) = cm.stats().snapshot();
        info!(traces, brush_tests, point_contents, "collision stats");
    }
}

fn cmd_info(args: &[String], config: &CmConfig) -> Result<()> {
    let [path, ..] = args else {
        return Err(ToolError::Usage("info <map>"));
    };
    let (cm, checksum) = load(path, config)?;

    println!("checksum     {:08x}", checksum);
    println!("planes       {}", cm.planes().len());
    println!("nodes        {}", cm.nodes().len());
    println!("leafs        {}", cm.leafs().len());
    println!("brushes      {}", cm.brushes().len());
    println!("brush sides  {}", cm.brush_sides().len());
    println!("surfaces     {}", cm.surfaces().len());
    println!("clusters     {}", cm.num_clusters());
    println!("models       {}", cm.num_models());

    for (i, m) in cm.models().iter().enumerate() {
        println!(
            "  {:>4} ({:.0} {:.0} {:.0}) - ({:.0} {:.0} {:.0})",
            if i == 0 { "world".to_string() } else { format!("*{}", i) },
            m.mins[0],
            m.mins[1],
            m.mins[2],
            m.maxs[0],
            m.maxs[1],
            m.maxs[2]
        );
    }

    let entities = cm.entities()?;
    println!("entities     {}", entities.len());
    if let Some(message) = entities.first().and_then(|e| e.value("message")) {
        println!("message      {}", message);
    }
    Ok(())
}

fn cmd_contents(args: &[String], config: &CmConfig) -> Result<()> {
    if args.len() < 4 {
        return Err(ToolError::Usage("contents <map> x y z [*N]"));
    }
    let (cm, _) = load(&args[0], config)?;
    let p = parse_vec3(&args[1..4])?;
    let head = head_node(&cm, args.get(4).map(String::as_str))?;

    let leaf = cm.point_leafnum(&p, head);
    println!(
        "leaf {} cluster {} area {} contents {:?}",
        leaf,
        cm.leaf_cluster(leaf),
        cm.leaf_area(leaf),
        cm.point_contents(&p, head)
    );
    log_stats(&cm);
    Ok(())
}

fn cmd_trace(args: &[String], config: &CmConfig) -> Result<()> {
    let TraceArgs { map, start, end, mins, maxs, model } = parse_trace_args(args)?;
    let (cm, _) = load(&map, config)?;
    let head = head_node(&cm, model.as_deref())?;

    let trace = cm.box_trace(&start, &end, &mins, &maxs, head, MASK_ALL);
    println!("fraction     {}", trace.fraction);
    println!("end          {} {} {}", trace.end[0], trace.end[1], trace.end[2]);
    println!("start solid  {}", trace.start_solid);
    println!("all solid    {}", trace.all_solid);
    if trace.fraction < 1.0 && !trace.all_solid {
        let n = trace.plane.normal;
        println!("plane        ({} {} {}) {}", n[0], n[1], n[2], trace.plane.dist);
        println!("contents     {:?}", trace.contents);
        match &trace.surface {
            Some(s) => println!("surface      {} {:?} {}", s.name, s.flags, s.value),
            None => println!("surface      none"),
        }
    }
    log_stats(&cm);
    Ok(())
}

fn cmd_leafs(args: &[String], config: &CmConfig) -> Result<()> {
    if args.len() < 7 {
        return Err(ToolError::Usage("leafs <map> minx miny minz maxx maxy maxz"));
    }
    let (cm, _) = load(&args[0], config)?;
    let mins = parse_vec3(&args[1..4])?;
    let maxs = parse_vec3(&args[4..7])?;

    let list = cm.box_leafnums(&mins, &maxs, cm.world_model().head_node, config.leaf_list_capacity);
    match list.top_node {
        Some(n) => println!("top node {}", n),
        None => println!("top node none"),
    }
    for leaf in list.leafs {
        println!(
            "leaf {} cluster {} contents {:?}",
            leaf,
            cm.leaf_cluster(leaf),
            cm.leaf_contents(leaf)
        );
    }
    Ok(())
}

fn cmd_build_box(args: &[String]) -> Result<()> {
    if args.len() < 7 {
        return Err(ToolError::Usage("build-box <out> minx miny minz maxx maxy maxz"));
    }
    let mins = parse_vec3(&args[1..4])?;
    let maxs = parse_vec3(&args[4..7])?;

    let mut builder = BspBuilder::new();
    builder.add_box(&mins, &maxs, Contents::SOLID)?;
    let bytes = builder.build()?.to_bytes();

    std::fs::write(&args[0], &bytes).map_err(|source| ToolError::Write {
        path: args[0].clone(),
        source,
    })?;
    info!("wrote {} ({} bytes)", args[0], bytes.len());
    Ok(())
}

fn run(args: &[String], config: &CmConfig) -> Result<()> {
    let Some((command, rest)) = args.split_first() else {
        return Err(ToolError::Usage(USAGE));
    };

    match command.as_str() {
        "info" => cmd_info(rest, config),
        "contents" => cmd_contents(rest, config),
        "trace" => cmd_trace(rest, config),
        "leafs" => cmd_leafs(rest, config),
        "build-box" => cmd_build_box(rest),
        _ => Err(ToolError::Usage(USAGE)),
    }
}

fn main() -> ExitCode {
    let mut cvars = CvarContext::new();
    cvars.get("developer", "0");
    let args = cvars.apply_set_args(std::env::args().skip(1));

    init_logging(&cvars);
    let config = CmConfig::from_cvars(&mut cvars);

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_point_trace_args() {
        let parsed = parse_trace_args(&args("maps/box.bsp 0 0 100 0 0 -100")).unwrap();
        assert_eq!(parsed.map, "maps/box.bsp");
        assert_eq!(parsed.start, [0.0, 0.0, 100.0]);
        assert_eq!(parsed.end, [0.0, 0.0, -100.0]);
        assert_eq!(parsed.mins, [0.0; 3]);
        assert_eq!(parsed.maxs, [0.0; 3]);
        assert_eq!(parsed.model, None);
    }

    #[test]
    fn test_box_trace_args_with_model() {
        let parsed =
            parse_trace_args(&args("maps/box.bsp 0 0 100 0 0 -100 -16 -16 -24 16 16 32 *2")).unwrap();
        assert_eq!(parsed.mins, [-16.0, -16.0, -24.0]);
        assert_eq!(parsed.maxs, [16.0, 16.0, 32.0]);
        assert_eq!(parsed.model.as_deref(), Some("*2"));

        let point = parse_trace_args(&args("maps/box.bsp 0 0 100 0 0 -100 *1")).unwrap();
        assert_eq!(point.mins, [0.0; 3]);
        assert_eq!(point.model.as_deref(), Some("*1"));
    }

    #[test]
    fn test_partial_box_is_rejected() {
        for extra in ["-16", "-16 -16 -24", "-16 -16 -24 16 16", "-16 -16 -24 16 16 *1"] {
            let line = format!("maps/box.bsp 0 0 100 0 0 -100 {}", extra);
            assert!(
                matches!(parse_trace_args(&args(&line)), Err(ToolError::Usage(_))),
                "{}",
                line
            );
        }
        assert!(matches!(
            parse_trace_args(&args("maps/box.bsp 0 0 100")),
            Err(ToolError::Usage(_))
        ));
    }

    #[test]
    fn test_bad_number() {
        assert!(matches!(
            parse_trace_args(&args("maps/box.bsp 0 zero 100 0 0 -100")),
            Err(ToolError::BadNumber(s)) if s == "zero"
        ));
    }
}
