// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Batch driver: generates random instances of the selected problem class,
//! solves each of them, prints a summary line per instance and optionally
//! dumps the instances and timings to a CSV file (one metadata row, one
//! right-hand-side row, then the x and y breakpoints of every function) so
//! that external tooling can re-solve the very same instances.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use plopt::{generator, minimize, Instance, Parameters, ProblemClass, SolveStatus};

#[derive(Parser)]
#[command(author, version, about = "random-instance benchmark batches")]
struct Args {
    /// Problem class: knapsack, concave-knapsack, global-knapsack,
    /// network-flow or discontinuous-network-flow
    #[arg(short, long, default_value = "knapsack")]
    problem: ProblemClass,
    /// Number of variables (must be a square for the flow classes)
    #[arg(short = 'n', long, default_value_t = 100)]
    vars: usize,
    /// Number of segments per function
    #[arg(short = 'k', long, default_value_t = 100)]
    segments: usize,
    /// Number of random instances to solve
    #[arg(short, long, default_value_t = 5)]
    instances: usize,
    /// Seed of the instance stream
    #[arg(short, long, default_value_t = 1)]
    seed: u64,
    /// Wall-clock budget per instance, in seconds
    #[arg(short, long, default_value_t = 1800.0)]
    time_limit: f64,
    /// Relative optimality gap sufficient for termination
    #[arg(short, long, default_value_t = 1e-5)]
    epsilon: f64,
    /// Where to write the CSV dump of the batch (omit to skip the dump)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut writer = args
        .output
        .as_ref()
        .map(|path| csv::Writer::from_path(path).expect("cannot open the output file"));

    let parameters = Parameters {
        time_limit: Duration::from_secs_f64(args.time_limit),
        epsilon: args.epsilon,
    };

    let mut solved = 0;
    while solved < args.instances {
        let (functions, rhs) = match args.problem {
            ProblemClass::Knapsack | ProblemClass::GlobalKnapsack => {
                let functions = generator::knapsack_functions(args.vars, args.segments, false, &mut rng);
                let rhs = vec![generator::knapsack_rhs(&functions, &mut rng)];
                (functions, rhs)
            }
            ProblemClass::ConcaveKnapsack => {
                let functions = generator::knapsack_functions(args.vars, args.segments, true, &mut rng);
                let rhs = vec![generator::knapsack_rhs(&functions, &mut rng)];
                (functions, rhs)
            }
            ProblemClass::NetworkFlow => {
                let functions = generator::network_functions(args.vars, args.segments, &mut rng);
                let side = (args.vars as f64).sqrt() as usize;
                (functions, generator::flow_rhs(side, &mut rng))
            }
            ProblemClass::DiscontinuousNetworkFlow => {
                let functions =
                    generator::discontinuous_network_functions(args.vars, args.segments, &mut rng);
                let side = (args.vars as f64).sqrt() as usize;
                (functions, generator::flow_rhs(side, &mut rng))
            }
        };

        let instance = Instance::new(functions, args.problem, rhs)
            .expect("generated instances are well formed");
        let outcome = minimize(&instance, parameters.clone());

        if outcome.status == SolveStatus::Infeasible {
            // a corner-case draw; replace it with a fresh instance
            println!("infeasible instance, drawing a new one");
            continue;
        }
        solved += 1;

        println!(
            "[{}/{}] {:?}: lb {:.6} ub {:.6} gap {:.2e} nodes {} time {:.3}s",
            solved,
            args.instances,
            outcome.status,
            outcome.lower_bound,
            outcome.upper_bound,
            outcome.gap(),
            outcome.node_count,
            outcome.elapsed.as_secs_f64(),
        );

        if let Some(writer) = writer.as_mut() {
            dump(writer, &args, &instance, &outcome);
        }
    }
    println!("computations are done");
}

/// One metadata row, one rhs row, then the x rows and y rows of every
/// function of the instance.
fn dump(
    writer: &mut csv::Writer<std::fs::File>,
    args: &Args,
    instance: &Instance,
    outcome: &plopt::SolveOutcome,
) {
    let meta = vec![
        args.problem.to_string(),
        args.vars.to_string(),
        args.segments.to_string(),
        outcome.elapsed.as_secs_f64().to_string(),
        outcome.timings.model.as_secs_f64().to_string(),
        outcome.timings.lp.as_secs_f64().to_string(),
        outcome.timings.envelope.as_secs_f64().to_string(),
        outcome.timings.evaluation.as_secs_f64().to_string(),
    ];
    writer.write_record(&meta).expect("cannot write the output file");

    let rhs: Vec<String> = instance.rhs().iter().map(|v| v.to_string()).collect();
    writer.write_record(&rhs).expect("cannot write the output file");

    for f in instance.functions() {
        let row: Vec<String> = f.breakpoints_x().iter().map(|v| v.to_string()).collect();
        writer.write_record(&row).expect("cannot write the output file");
    }
    for f in instance.functions() {
        let row: Vec<String> = f.breakpoints_y().iter().map(|v| v.to_string()).collect();
        writer.write_record(&row).expect("cannot write the output file");
    }
    writer.flush().expect("cannot write the output file");
}
