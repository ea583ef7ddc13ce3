//! End-to-end cycles through the multi-threaded clock

use indexmap::IndexMap;
use phasesim_sim::{
    Bits, Circuit, CircuitBuilder, Clock, ClockConfig, ClockableId, ComponentId, GateKind,
    PartitionStrategy, SimError,
};
use proptest::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bits(width: u32, value: u64) -> Bits {
    Bits::new(width, value).unwrap()
}

#[test]
fn test_registers_through_adder() {
    init_tracing();
    let mut builder = CircuitBuilder::new();
    let sum = builder.wire("sum", 8).unwrap();
    let adder = builder.adder("add", sum, None).unwrap();
    let a = builder.wire_to("a", 8, &[adder.a]).unwrap();
    let b = builder.wire_to("b", 8, &[adder.b]).unwrap();
    let cin = builder.wire_to("cin", 1, &[adder.cin]).unwrap();
    builder.register("ra", bits(8, 7), Some(a)).unwrap();
    builder.register("rb", bits(8, 8), Some(b)).unwrap();
    builder.constant("carry", bits(1, 0), Some(cin)).unwrap();
    let total = builder.register("total", bits(8, 0), None).unwrap();
    builder.add_targets(sum, &[total.input]).unwrap();

    let mut clock = Clock::for_circuit(builder.build().unwrap(), ClockConfig::default()).unwrap();
    clock.cycle().unwrap();
    assert_eq!(clock.circuit().clockable_value(total.id).unwrap(), 15);
    assert_eq!(clock.cycles(), 1);
    clock.shutdown().unwrap();
}

#[test]
fn test_overflow_into_carry_register() {
    init_tracing();
    let mut builder = CircuitBuilder::new();
    let sum = builder.wire("sum", 8).unwrap();
    let carry = builder.wire("carry", 1).unwrap();
    let adder = builder.adder("add", sum, Some(carry)).unwrap();
    let a = builder.wire_to("a", 8, &[adder.a]).unwrap();
    let b = builder.wire_to("b", 8, &[adder.b]).unwrap();
    let cin = builder.wire_to("cin", 1, &[adder.cin]).unwrap();
    builder.constant("ka", bits(8, 251), Some(a)).unwrap();
    builder.constant("kb", bits(8, 6), Some(b)).unwrap();
    builder.constant("kc", bits(1, 0), Some(cin)).unwrap();
    let result = builder.register("result", bits(8, 0), None).unwrap();
    let cout = builder.register("cout", bits(1, 0), None).unwrap();
    builder.add_targets(sum, &[result.input]).unwrap();
    builder.add_targets(carry, &[cout.input]).unwrap();

    let mut clock =
        Clock::for_circuit(builder.build().unwrap(), ClockConfig::with_workers(2)).unwrap();
    clock.cycle().unwrap();
    let circuit = clock.circuit();
    assert_eq!(circuit.clockable_value(result.id).unwrap(), 1);
    assert_eq!(circuit.clockable_value(cout.id).unwrap(), 1);
}

/// Ids of interest in the two-pipeline circuit
struct Pipelines {
    registers: [ClockableId; 4],
    constants: [ClockableId; 4],
    s0: ComponentId,
    s1: ComponentId,
}

impl Pipelines {
    fn clockables(&self) -> Vec<ClockableId> {
        self.registers.iter().chain(&self.constants).copied().collect()
    }
}

/// Two pipelines of constants, adders and inverters feeding OR/XOR sinks
fn pipelines() -> (Circuit, Pipelines) {
    let mut b = CircuitBuilder::new();
    let w0 = b.wire("Wire0", 8).unwrap();
    let w1 = b.wire("Wire1", 8).unwrap();
    let w2 = b.wire("Wire2", 8).unwrap();
    let w3 = b.wire("Wire3", 8).unwrap();
    let w4 = b.wire("Wire4", 8).unwrap();
    let w5 = b.wire("Wire5", 1).unwrap();
    let w6 = b.wire("Wire6", 1).unwrap();
    let w7 = b.wire("Wire7", 8).unwrap();
    let w8 = b.wire("Wire8", 8).unwrap();
    let w9 = b.wire("Wire9", 8).unwrap();
    let w10 = b.wire("Wire10", 8).unwrap();
    let w11 = b.wire("Wire11", 8).unwrap();
    let w12 = b.wire("Wire12", 8).unwrap();
    let w13 = b.wire("Wire13", 8).unwrap();

    let r0 = b.register("Register0", bits(8, 25), Some(w0)).unwrap();
    let r1 = b.register("Register1", bits(8, 25), Some(w2)).unwrap();
    let c0 = b.constant("Constant0", bits(8, 1), Some(w1)).unwrap();
    let c1 = b.constant("Constant1", bits(8, 1), Some(w4)).unwrap();
    let c2 = b.constant("Constant2", bits(1, 0), Some(w5)).unwrap();
    let c3 = b.constant("Constant3", bits(1, 1), Some(w6)).unwrap();

    let a0 = b.adder("Adder0", w7, None).unwrap();
    let a1 = b.adder("Adder1", w8, None).unwrap();
    let i0 = b.inverter("Inverter0", w3).unwrap();

    let r2 = b.register("Register2", bits(8, 0), Some(w9)).unwrap();
    let r3 = b.register("Register3", bits(8, 0), Some(w10)).unwrap();

    let i1 = b.inverter("Inverter1", w11).unwrap();
    let or = b.gate(GateKind::Or, "ORGate", w12).unwrap();
    let xor = b.gate(GateKind::Xor, "XORGate", w13).unwrap();
    let s0 = b.sink("Sink0", 8).unwrap();
    let s1 = b.sink("Sink1", 8).unwrap();

    b.add_targets(w0, &[a0.a]).unwrap();
    b.add_targets(w1, &[a0.b]).unwrap();
    b.add_targets(w2, &[a1.a]).unwrap();
    b.add_targets(w3, &[a1.b]).unwrap();
    b.add_targets(w4, &[i0.input]).unwrap();
    b.add_targets(w5, &[a0.cin]).unwrap();
    b.add_targets(w6, &[a1.cin]).unwrap();
    b.add_targets(w7, &[r0.input, r2.input]).unwrap();
    b.add_targets(w8, &[r1.input, r3.input]).unwrap();
    b.add_targets(w9, &[or.a, xor.a]).unwrap();
    b.add_targets(w10, &[i1.input]).unwrap();
    b.add_targets(w11, &[or.b, xor.b]).unwrap();
    b.add_targets(w12, &[s0.input]).unwrap();
    b.add_targets(w13, &[s1.input]).unwrap();

    let ids = Pipelines {
        registers: [r0.id, r1.id, r2.id, r3.id],
        constants: [c0, c1, c2, c3],
        s0: s0.id,
        s1: s1.id,
    };
    (b.build().unwrap(), ids)
}

fn assert_pipeline_state(clock: &Clock, p: &Pipelines, registers: [u64; 4], sinks: [u64; 2]) {
    let circuit = clock.circuit();
    for (id, expected) in p.registers.iter().zip(registers) {
        assert_eq!(circuit.clockable_value(*id).unwrap(), expected, "{id}");
    }
    assert_eq!(circuit.component_output(p.s0).unwrap(), sinks[0]);
    assert_eq!(circuit.component_output(p.s1).unwrap(), sinks[1]);
}

#[test]
fn test_pipelines_two_cycles() {
    init_tracing();
    for workers in [1, 2, 4, 20] {
        let (circuit, p) = pipelines();
        let mut clock =
            Clock::with_clockables(circuit, ClockConfig::with_workers(workers), &p.clockables())
                .unwrap();

        clock.cycle().unwrap();
        // 0 | !0 and 0 ^ !0
        assert_pipeline_state(&clock, &p, [26, 24, 26, 24], [0xff, 0xff]);

        clock.cycle().unwrap();
        // 26 | !24 and 26 ^ !24
        assert_pipeline_state(&clock, &p, [27, 23, 27, 23], [0xff, 0xfd]);
        assert!(clock.circuit().is_quiescent());
    }
}

#[test]
fn test_pipelines_partitioned_by_cone() {
    let (circuit, p) = pipelines();
    let mut clock =
        Clock::with_clockables(circuit, ClockConfig::with_workers(4), &p.clockables()).unwrap();
    let partition = clock.partition().unwrap();

    let [r0, r1, r2, r3] = p.registers;
    let [c0, c1, c2, c3] = p.constants;
    assert_eq!(partition.worker(0), &[r0, c0, c2]);
    assert_eq!(partition.worker(1), &[r1, c1, c3]);
    assert_eq!(partition.worker(2), &[r2, r3]);
    assert!(partition.worker(3).is_empty());
}

#[cfg(debug_assertions)]
#[test]
fn test_round_robin_rejects_shared_logic() {
    let (circuit, p) = pipelines();
    let config = ClockConfig::with_workers(2).with_partition(PartitionStrategy::RoundRobin);
    let mut clock = Clock::with_clockables(circuit, config, &p.clockables()).unwrap();
    assert!(matches!(
        clock.cycle(),
        Err(SimError::PartitionOverlap { .. })
    ));
    assert_eq!(clock.cycles(), 0);
}

#[test]
fn test_round_robin_single_worker() {
    let (circuit, p) = pipelines();
    let config = ClockConfig::with_workers(1).with_partition(PartitionStrategy::RoundRobin);
    let mut clock = Clock::with_clockables(circuit, config, &p.clockables()).unwrap();
    clock.run(2).unwrap();
    let circuit = clock.circuit();
    assert_eq!(circuit.clockable_value(p.registers[0]).unwrap(), 27);
    assert_eq!(circuit.clockable_value(p.registers[1]).unwrap(), 23);
}

/// Independent accumulators plus an XOR mixing stage between pairs of them
fn mixer(lanes: u64) -> Circuit {
    let mut b = CircuitBuilder::new();
    let mut outputs = Vec::new();
    for lane in 0..lanes {
        let sum = b.wire(format!("sum{lane}"), 16).unwrap();
        let adder = b.adder(format!("add{lane}"), sum, None).unwrap();
        let q = b.wire_to(format!("q{lane}"), 16, &[adder.a]).unwrap();
        let step = b.wire_to(format!("step{lane}"), 16, &[adder.b]).unwrap();
        let cin = b.wire_to(format!("cin{lane}"), 1, &[adder.cin]).unwrap();
        let acc = b
            .register(format!("acc{lane}"), bits(16, lane * 977), Some(q))
            .unwrap();
        b.add_targets(sum, &[acc.input]).unwrap();
        b.constant(format!("k{lane}"), bits(16, 3 * lane + 1), Some(step))
            .unwrap();
        b.constant(format!("c{lane}"), bits(1, lane % 2), Some(cin))
            .unwrap();
        outputs.push(sum);
    }
    for (pair, sums) in outputs.chunks(2).enumerate() {
        if let [left, right] = sums {
            let mixed = b.wire(format!("mixed{pair}"), 16).unwrap();
            let xor = b.gate(GateKind::Xor, format!("xor{pair}"), mixed).unwrap();
            b.add_targets(*left, &[xor.a]).unwrap();
            b.add_targets(*right, &[xor.b]).unwrap();
            let out = b.register(format!("out{pair}"), bits(16, 0), None).unwrap();
            b.add_targets(mixed, &[out.input]).unwrap();
        }
    }
    b.build().unwrap()
}

fn trace_run(workers: usize, cycles: usize) -> Vec<IndexMap<String, Bits>> {
    let mut clock = Clock::for_circuit(mixer(9), ClockConfig::with_workers(workers)).unwrap();
    (0..cycles)
        .map(|_| {
            clock.cycle().unwrap();
            clock.circuit().snapshot()
        })
        .collect()
}

#[test]
fn test_worker_count_does_not_change_results() {
    init_tracing();
    let reference = trace_run(1, 25);
    for workers in [2, 4, 0] {
        assert_eq!(trace_run(workers, 25), reference, "{workers} workers");
    }
}

#[test]
fn test_duplicate_driver_fails_cycle() {
    let mut b = CircuitBuilder::new();
    let shared = b.wire("shared", 4).unwrap();
    let sink = b.sink("sink", 4).unwrap();
    b.add_targets(shared, &[sink.input]).unwrap();
    b.constant("first", bits(4, 1), Some(shared)).unwrap();
    b.constant("second", bits(4, 2), Some(shared)).unwrap();

    let mut clock = Clock::for_circuit(b.build().unwrap(), ClockConfig::with_workers(2)).unwrap();
    assert!(matches!(
        clock.cycle(),
        Err(SimError::AlreadySet(name)) if name == "shared"
    ));
    assert_eq!(clock.cycles(), 0);
    // The reset phase still ran
    assert!(clock.circuit().is_quiescent());
    assert!(clock.cycle().is_err());
}

#[test]
fn test_clockables_added_between_cycles() {
    let mut b = CircuitBuilder::new();
    let sink = b.sink("sink", 8).unwrap();
    let w = b.wire_to("w", 8, &[sink.input]).unwrap();
    let c = b.constant("c", bits(8, 0x5a), Some(w)).unwrap();
    let circuit = b.build().unwrap();

    let mut clock = Clock::new(circuit, ClockConfig::with_workers(2)).unwrap();
    clock.cycle().unwrap();
    assert_eq!(clock.circuit().component_output(sink.id).unwrap(), 0);

    clock.add_clockable(c).unwrap();
    clock.cycle().unwrap();
    assert_eq!(clock.circuit().component_output(sink.id).unwrap(), 0x5a);
    assert_eq!(clock.clockables(), &[c]);
    assert_eq!(clock.cycles(), 2);
}

#[test]
fn test_config_from_toml() {
    let config = ClockConfig::from_toml_str("worker_threads = 3\npartition = \"cones\"").unwrap();
    let clock = Clock::for_circuit(pipelines().0, config).unwrap();
    assert_eq!(clock.worker_count(), 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_accumulator_matches_model(
        width in 1u32..=16,
        initial in any::<u64>(),
        step in any::<u64>(),
        cycles in 0u64..20,
    ) {
        let mut b = CircuitBuilder::new();
        let sum = b.wire("sum", width).unwrap();
        let adder = b.adder("add", sum, None).unwrap();
        let q = b.wire_to("q", width, &[adder.a]).unwrap();
        let k = b.wire_to("k", width, &[adder.b]).unwrap();
        let cin = b.wire_to("cin", 1, &[adder.cin]).unwrap();
        let acc = b.register("acc", bits(width, initial), Some(q)).unwrap();
        b.add_targets(sum, &[acc.input]).unwrap();
        b.constant("step", bits(width, step), Some(k)).unwrap();
        b.constant("carry", bits(1, 0), Some(cin)).unwrap();

        let mut clock = Clock::for_circuit(b.build().unwrap(), ClockConfig::with_workers(2)).unwrap();
        clock.run(cycles).unwrap();

        let mask = (1u64 << width) - 1;
        let expected = (initial & mask).wrapping_add((step & mask).wrapping_mul(cycles)) & mask;
        prop_assert_eq!(clock.circuit().clockable_value(acc.id).unwrap().value(), expected);
    }
}
