use std::error::Error;

use philbrick::{CircuitDef, Machine, Scope};

/// x'' = -x as a circuit document: two integrators and an inverting pot
const OSCILLATOR: &str = r#"{
    "name": "harmonic-oscillator",
    "description": "sin/cos quadrature oscillator",
    "settings": {"dt": 0.001},
    "components": [
        {"name": "INT1", "type": "Integrator", "params": {"initial": 0.0}},
        {"name": "INT2", "type": "Integrator", "params": {"initial": 1.0}},
        {"name": "COEF", "type": "Coefficient", "params": {"k": -1.0}}
    ],
    "patches": [
        ["INT2.out", "INT1.in"],
        ["COEF.out", "INT2.in"],
        ["INT1.out", "COEF.in"]
    ],
    "scope": {
        "channels": [
            {"source": "INT1.out", "label": "sin"},
            {"source": "INT2.out", "label": "cos"}
        ]
    }
}"#;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("Philbrick - patch-programmable analog computer");
    println!("==============================================\n");

    // optional argument: path of a circuit JSON file
    let def = match std::env::args().nth(1) {
        Some(path) => CircuitDef::from_json(&std::fs::read_to_string(path)?)?,
        None => CircuitDef::from_json(OSCILLATOR)?,
    };
    println!("Circuit: {}", def.name);
    if !def.description.is_empty() {
        println!("  {}", def.description);
    }

    let mut machine = Machine::from_circuit(&def)?;
    println!(
        "  {} components, {} patches, dt = {} s\n",
        machine.len(),
        machine.connections().len(),
        machine.dt()
    );

    let steps = (2.0 * std::f64::consts::PI / machine.dt()).round() as u64;
    let mut scope = match &def.scope {
        Some(scope_def) => Scope::from_def(&machine, scope_def, steps as usize)?,
        None => Scope::new(steps as usize),
    };

    println!("Running {} steps...\n", steps);
    scope.run(&mut machine, steps)?;

    println!("{:>10} {:>10} {:>10} {:>10}", "channel", "min", "max", "final");
    println!("{:-<10} {:-<10} {:-<10} {:-<10}", "", "", "", "");
    for (i, channel) in scope.channels().iter().enumerate() {
        if let Some(stats) = scope.stats(i)? {
            println!(
                "{:>10} {:>10.4} {:>10.4} {:>10.4}",
                channel.label(),
                stats.min,
                stats.max,
                stats.final_value
            );
        }
    }
    println!("\nt = {:.4} s", machine.current_time());

    if let Ok(path) = std::env::var("PHILBRICK_CSV") {
        scope.save(&path)?;
        println!("Wrote {} samples to {}", scope.len(), path);
    }

    Ok(())
}
