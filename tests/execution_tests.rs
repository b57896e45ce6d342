// ERAC - A compiler for the ERA language targeting the ERA virtual machine
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.


//! End-to-end tests: compile ERA programs and execute the images.

mod common;

use common::{execute, run};
use pretty_assertions::assert_eq;
use test_case::test_case;

// ============================================================================
// Expressions
// ============================================================================

#[test_case("print 6 * 7;", &[42]; "folded multiply")]
#[test_case("print 2 + 3 * 4;", &[14]; "folded precedence")]
#[test_case("print 1 <= 3;", &[8]; "folded shift")]
#[test_case("print 6 ? 7;", &[2]; "folded compare")]
fn test_folded_expressions(body: &str, expected: &[i32]) {
    assert_eq!(run(&format!("code {} end", body)), expected);
}

#[test]
fn test_arithmetic_at_runtime() {
    let output = run("code int a := 6; int b := 7; print a * b, a - b, a + b; end");
    assert_eq!(output, vec![42, -1, 13]);
}

#[test]
fn test_negative_multiply() {
    assert_eq!(run("code int a := -3; print a * 5; end"), vec![-15]);
    assert_eq!(run("code int a := 5; int b := -3; print a * b; end"), vec![-15]);
}

#[test]
fn test_multiply_by_zero() {
    assert_eq!(run("code int a := 9; int b := 0; print a * b, b * a; end"), vec![0, 0]);
}

#[test]
fn test_comparisons_are_zero_or_one() {
    let output =
        run("code int a := 6; int b := 7; print a > b, a < b, a = b, a /= b; end");
    assert_eq!(output, vec![0, 1, 0, 1]);
}

#[test]
fn test_three_way_compare() {
    let output = run("code int a := 6; int b := 7; print a ? b, b ? a, a ? a; end");
    assert_eq!(output, vec![2, 1, 4]);
}

#[test]
fn test_shifts() {
    let output = run("code int s := 3; int one := 1; int big := 64; print one <= s, big >= s; end");
    assert_eq!(output, vec![8, 8]);
}

#[test]
fn test_runtime_shift_counts_match_folding() {
    let output = run(
        "code
            int one := 1; int huge := 2000000000; int full := 32; int most := 31; int neg := -5;
            print one <= huge, one <= full, one <= most, 7 >= huge, 7 <= neg;
        end",
    );
    assert_eq!(output, vec![0, 0, i32::MIN, 0, 7]);
}

#[test]
fn test_bitwise_operators() {
    let output = run("code int a := 12; int b := 10; print a & b, a | b, a ^ b; end");
    assert_eq!(output, vec![8, 14, 6]);
}

#[test]
fn test_mixed_precedence_at_runtime() {
    // Multiplication binds tighter than addition.
    assert_eq!(run("code int a := 2; print a + a * 3; end"), vec![8]);
}

// ============================================================================
// Control Flow
// ============================================================================

#[test]
fn test_if_else() {
    let source = "code
        int a := 3;
        if a > 2 do print 1; else print 2; end
        if a < 2 do print 3; else print 4; end
        if a = 3 do print 5; end
    end";
    assert_eq!(run(source), vec![1, 4, 5]);
}

#[test]
fn test_while_loop() {
    let source = "code int n := 3; while n > 0 loop print n; n := n - 1; end end";
    assert_eq!(run(source), vec![3, 2, 1]);
}

#[test]
fn test_while_loop_that_never_runs() {
    let source = "code int n := 0; while n > 0 loop print n; end print 7; end";
    assert_eq!(run(source), vec![7]);
}

#[test]
fn test_loop_while_runs_at_least_once() {
    let source = "code int n := 10; loop n := n + 1; while n < 5 end print n; end";
    assert_eq!(run(source), vec![11]);
}

#[test]
fn test_loop_while_counts() {
    let source = "code int n := 0; loop n := n + 1; while n < 5 end print n; end";
    assert_eq!(run(source), vec![5]);
}

#[test]
fn test_for_loop_counts_up() {
    assert_eq!(run("code for i from 0 to 3 loop print i; end end"), vec![0, 1, 2]);
}

#[test]
fn test_for_loop_counts_down() {
    let source = "code for i from 3 to 0 step -1 loop print i; end end";
    assert_eq!(run(source), vec![3, 2, 1]);
}

#[test]
fn test_for_loop_with_step() {
    let source = "code for i from 0 to 10 step 3 loop print i; end end";
    assert_eq!(run(source), vec![0, 3, 6, 9]);
}

#[test]
fn test_for_loop_sum() {
    let source = "code int s := 0; for i from 0 to 10 loop s := s + i; end print s; end";
    assert_eq!(run(source), vec![45]);
}

#[test]
fn test_for_bounds_are_evaluated_once() {
    let source = "code
        int n := 3;
        for i from 0 to n loop n := n + 1; print i; end
        print n;
    end";
    assert_eq!(run(source), vec![0, 1, 2, 6]);
}

#[test]
fn test_nested_for_loops() {
    let source = "code
        int s := 0;
        for i from 0 to 3 loop
            for j from 0 to 3 loop s := s + 1; end
        end
        print s;
    end";
    assert_eq!(run(source), vec![9]);
}

#[test]
fn test_break_leaves_innermost_loop() {
    let source = "code
        int n := 0;
        loop n := n + 1; if n = 4 do break; end end
        print n;
    end";
    assert_eq!(run(source), vec![4]);
}

#[test]
fn test_break_out_of_for_restores_heap() {
    let machine = execute(
        "code for i from 0 to 100 loop if i = 2 do break; end print i; end print 9; end",
    );
    assert_eq!(machine.output, vec![0, 1, 9]);
    assert_eq!(machine.heap_top() as usize, machine_image_end(&machine));
}

#[test]
fn test_goto_backwards() {
    let source = "code int n := 0; <top> n := n + 1; if n < 3 do goto top; end print n; end";
    assert_eq!(run(source), vec![3]);
}

#[test]
fn test_goto_out_of_nested_loops() {
    let machine = execute(
        "code
            for i from 0 to 3 loop
                for j from 0 to 3 loop
                    if i = 1 do goto done; end
                    print i;
                end
            end
            <done> print 99;
        end",
    );
    assert_eq!(machine.output, vec![0, 0, 0, 99]);
    assert_eq!(machine.heap_top() as usize, machine_image_end(&machine));
}

/// Heap top right after the prologue: the first byte after the code.
fn machine_image_end(machine: &common::Machine) -> usize {
    let code_base = u32::from_be_bytes([
        machine.memory[10],
        machine.memory[11],
        machine.memory[12],
        machine.memory[13],
    ]);
    let code_words = u32::from_be_bytes([
        machine.memory[14],
        machine.memory[15],
        machine.memory[16],
        machine.memory[17],
    ]);
    (code_base + code_words * 2) as usize
}

// ============================================================================
// Routines
// ============================================================================

#[test]
fn test_routine_with_result() {
    let source = "routine add(int a, int b) : int do return a + b; end
                  code print add(2, 3); end";
    assert_eq!(run(source), vec![5]);
}

#[test]
fn test_recursive_routine() {
    let source = "routine fact(int n) : int do
                      if n < 2 do return 1; end
                      return n * fact(n - 1);
                  end
                  code print fact(5); end";
    assert_eq!(run(source), vec![120]);
}

#[test]
fn test_module_routine() {
    let source = "module m routine twice(int v) : int do return v + v; end end
                  code print m.twice(21); end";
    assert_eq!(run(source), vec![42]);
}

#[test]
fn test_routine_declared_after_use() {
    let source = "code hi(); hi(); end routine hi() do print 1; end";
    assert_eq!(run(source), vec![1, 1]);
}

#[test]
fn test_call_keeps_live_temporaries() {
    let source = "routine one() : int do return 1; end
                  code int a := 40; print a + one() + one(); end";
    assert_eq!(run(source), vec![42]);
}

#[test]
fn test_early_return() {
    let source = "routine pick(int a) : int do
                      if a > 0 do return 1; end
                      return 2;
                  end
                  code print pick(5), pick(-5); end";
    assert_eq!(run(source), vec![1, 2]);
}

#[test]
fn test_stack_is_balanced_after_calls() {
    let machine = execute(
        "routine f(int a) : int do return a + 1; end
         code int x := f(1); x := f(x); print x; end",
    );
    assert_eq!(machine.output, vec![3]);
    assert_eq!(machine.heap_top() as usize, machine_image_end(&machine));
}

// ============================================================================
// Variables and Storage
// ============================================================================

#[test]
fn test_shadowing() {
    let source = "code int x := 1; do int x := 2; print x; end print x; end";
    assert_eq!(run(source), vec![2, 1]);
}

#[test]
fn test_inner_block_sees_outer_variable() {
    let source = "code int x := 1; do x := x + 4; end print x; end";
    assert_eq!(run(source), vec![5]);
}

#[test]
fn test_swap() {
    let source = "code int a := 1; int b := 2; a <=> b; print a, b; end";
    assert_eq!(run(source), vec![2, 1]);
}

#[test]
fn test_byte_and_short_wrap() {
    let source = "code
        byte b := 255; b := b + 1; print b;
        short s := 65535; s := s + 2; print s;
    end";
    assert_eq!(run(source), vec![0, 1]);
}

#[test]
fn test_static_array() {
    let source = "code
        int[] a[3];
        a[0] := 1; a[1] := 2; a[2] := 3;
        print a[0] + a[1] + a[2];
    end";
    assert_eq!(run(source), vec![6]);
}

#[test]
fn test_byte_array_elements_are_independent() {
    let source = "code
        byte[] a[4];
        a[0] := 1; a[1] := 2; a[2] := 3; a[3] := 4;
        print a[0], a[1], a[2], a[3];
    end";
    assert_eq!(run(source), vec![1, 2, 3, 4]);
}

#[test]
fn test_dynamic_array() {
    let source = "code
        int n := 4;
        int[] a[n];
        int i := 0;
        while i < n loop a[i] := i * i; i := i + 1; end
        print a[3], a[2];
    end";
    assert_eq!(run(source), vec![9, 4]);
}

#[test]
fn test_dynamic_array_is_freed() {
    let machine = execute(
        "code int n := 3; do int[] a[n]; a[0] := 5; print a[0]; end print 1; end",
    );
    assert_eq!(machine.output, vec![5, 1]);
    assert_eq!(machine.heap_top() as usize, machine_image_end(&machine));
}

#[test]
fn test_goto_before_dynamic_array_reuses_heap() {
    let machine = execute(
        "code
            int n := 2; int k := 0;
            do
                <top> int[] a[n];
                k := k + 1;
                if k < 3 do goto top; end
                print k;
            end
            print 9;
        end",
    );
    assert_eq!(machine.output, vec![3, 9]);
    assert_eq!(machine.heap_top() as usize, machine_image_end(&machine));
}

#[test]
fn test_goto_before_two_dynamic_arrays_releases_newest_first() {
    let machine = execute(
        "code
            int n := 2; int k := 0;
            do
                int[] keep[1];
                keep[0] := 7;
                <top> int[] a[n];
                int[] b[n + 1];
                b[n] := k;
                k := k + 1;
                if k < 4 do goto top; end
                print keep[0], b[n];
            end
            print 9;
        end",
    );
    assert_eq!(machine.output, vec![7, 3, 9]);
    assert_eq!(machine.heap_top() as usize, machine_image_end(&machine));
}

#[test]
fn test_local_struct() {
    let source = "struct P int x; int y; end
                  code P p; p.x := 3; p.y := 4; print p.x + p.y; end";
    assert_eq!(run(source), vec![7]);
}

#[test]
fn test_global_struct() {
    let source = "struct P int x; end P g; code g.x := 5; print g.x; end";
    assert_eq!(run(source), vec![5]);
}

#[test]
fn test_global_and_data() {
    let source = "int g := 10; data d 3, 4 end code print g + d[0] + d[1]; end";
    assert_eq!(run(source), vec![17]);
}

#[test]
fn test_global_updated_by_routine() {
    let source = "int counter := 1;
                  routine bump() do counter := counter + 1; end
                  code bump(); bump(); print counter; end";
    assert_eq!(run(source), vec![3]);
}

#[test]
fn test_reference_and_dereference() {
    let source = "code int a := 8; int@ p := <-a; print ->p; ->p := 9; print a; end";
    assert_eq!(run(source), vec![8, 9]);
}

#[test]
fn test_constants() {
    let source = "const n = 4; code int[] a[n]; a[n - 1] := n * 2; print a[3]; end";
    assert_eq!(run(source), vec![8]);
}

#[test]
fn test_register_pressure() {
    let names: Vec<String> = (0..30).map(|i| format!("v{}", i)).collect();
    let declarations: String = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("int {} := {}; ", name, i))
        .collect();
    let source = format!("code {}print {}; end", declarations, names.join(" + "));
    assert_eq!(run(&source), vec![435]);
}

// ============================================================================
// Inline Assembly and Configuration
// ============================================================================

#[test]
fn test_asm_block() {
    assert_eq!(run("code asm R1 := 7; print R1; end end"), vec![7]);
}

#[test]
fn test_asm_register_arithmetic() {
    let source = "code asm R1 := 7; R2 := 5; R1 += R2; print R1; end end";
    assert_eq!(run(source), vec![12]);
}

#[test]
fn test_memory_pragma() {
    let mut config = erac::CompilerConfig::default();
    let image =
        erac::compile_with_config("pragma memory(\"KB 4\"); code print 1; end", &mut config)
            .unwrap();
    assert_eq!(config.memory_budget, 4096);
    let mut machine = common::Machine::load(&image, config.memory_budget).unwrap();
    machine.run().unwrap();
    assert_eq!(machine.output, vec![1]);
}
