use std::collections::BTreeMap;

use console::Style;
use deinterlace_core::config::RunConfig;
use deinterlace_core::BlockOffset;

/// Above this many blocks the offsets are summarised as a histogram.
const MAX_LISTED_BLOCKS: usize = 24;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &RunConfig, device_name: &str) {
    let s = Styles::new();
    let opts = &config.deinterlace;

    println!();
    println!("  {}", s.title.apply_to("Resonant Deinterlace"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(20)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Device"),
        s.method.apply_to(device_name)
    );

    match opts.block_size {
        Some(size) => println!(
            "  {:<14}{}",
            s.label.apply_to("Block size"),
            s.value.apply_to(size)
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Block size"),
            s.disabled.apply_to("whole recording")
        ),
    }
    match opts.unstable {
        Some(frames) => println!(
            "  {:<14}{}",
            s.label.apply_to("Unstable"),
            s.value.apply_to(format!("{frames} frames"))
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Unstable"),
            s.disabled.apply_to("none")
        ),
    }
    if opts.subsample {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Estimate on"),
            s.method.apply_to("per-pixel std. deviation")
        );
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Estimate on"),
            s.method.apply_to("raw frames")
        );
    }
    println!();
}

pub fn print_offsets(offsets: &[BlockOffset]) {
    let s = Styles::new();
    println!();

    if offsets.len() <= MAX_LISTED_BLOCKS {
        for entry in offsets {
            println!(
                "  {:<18}{}",
                s.label
                    .apply_to(format!("frames {}..{}", entry.block.start, entry.block.stop)),
                s.value.apply_to(format!("{:+} px", entry.offset))
            );
        }
    } else {
        let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
        for entry in offsets {
            *histogram.entry(entry.offset).or_default() += 1;
        }
        println!(
            "  {}",
            s.title.apply_to(format!("{} blocks", offsets.len()))
        );
        for (offset, count) in histogram {
            println!(
                "  {:<18}{}",
                s.label.apply_to(format!("{offset:+} px")),
                s.value.apply_to(format!("{count} blocks"))
            );
        }
    }
    println!();
}
