mod runtime;

pub use runtime::RuntimeProc;

use lang::DataType;
use std::fmt::{self, Write};

/// Register-file size of the target machine. `R[0]` is the stack pointer,
/// `R[1]` the string high-water mark, `R[2..]` statement temporaries, and
/// `R[200..]` the argument staging area.
pub const REGISTER_SIZE: usize = 1024;
/// Flat memory image: globals and string storage grow up from 1, the stack
/// grows down from the top.
pub const MEMORY_SIZE: usize = 65536;
pub const ARG_BASE: usize = 200;
const FIRST_TEMP: usize = 2;

/// Tagged-cell field that carries a value of the given type.
pub fn field(ty: DataType) -> &'static str {
    match ty {
        DataType::Float => "floatVal",
        DataType::Str => "stringPointer",
        DataType::Invalid | DataType::Bool | DataType::Integer => "intVal",
    }
}

/// Append-only sink for the emitted translation unit.
///
/// Code lands in two buffers: the parse-ordered body of `main`, and the
/// deferred `programsetup` block holding string-literal storage. `disable`
/// turns every write into a no-op once an error has been diagnosed; cursor
/// and label allocation keep running so analysis stays deterministic.
pub struct Emitter {
    body: String,
    setup: String,
    enabled: bool,
    register_pointer: usize,
    memory_pointer: usize,
    if_count: usize,
    loop_count: usize,
    runtime_used: [bool; 8],
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            body: String::new(),
            setup: String::new(),
            enabled: true,
            register_pointer: FIRST_TEMP,
            memory_pointer: 1, // address 0 is reserved
            if_count: 0,
            loop_count: 0,
            runtime_used: [false; 8],
        }
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// One statement inside `main`.
    pub fn stmt(&mut self, args: fmt::Arguments<'_>) {
        if self.enabled {
            self.body.push('\t');
            let _ = self.body.write_fmt(args);
            self.body.push('\n');
        }
    }

    /// A label inside `main`. Emitted with an empty statement so a label can
    /// legally end a block.
    pub fn label(&mut self, args: fmt::Arguments<'_>) {
        if self.enabled {
            let _ = self.body.write_fmt(args);
            self.body.push_str(": ;\n");
        }
    }

    /// Pre-formatted lines, used for the buffered out-parameter stores.
    pub fn raw(&mut self, text: &str) {
        if self.enabled {
            self.body.push_str(text);
        }
    }

    pub fn alloc_reg(&mut self) -> usize {
        let reg = self.register_pointer;
        self.register_pointer += 1;
        reg
    }

    /// Statement boundary: temporaries start over at `R[2]`.
    pub fn reset_regs(&mut self) {
        self.register_pointer = FIRST_TEMP;
    }

    pub fn alloc_memory(&mut self, slots: usize) -> usize {
        let address = self.memory_pointer;
        self.memory_pointer += slots;
        address
    }

    pub fn next_if_id(&mut self) -> usize {
        let id = self.if_count;
        self.if_count += 1;
        id
    }

    pub fn next_loop_id(&mut self) -> usize {
        let id = self.loop_count;
        self.loop_count += 1;
        id
    }

    pub fn mark_runtime(&mut self, proc: RuntimeProc) {
        self.runtime_used[proc as usize] = true;
    }

    /// Interns the character cells of a string literal (text without its
    /// quotes) into the deferred storage block. Returns the base address.
    pub fn store_string(&mut self, text: &str) -> usize {
        let address = self.alloc_memory(text.len() + 1);
        if self.enabled {
            for (offset, ch) in text.chars().enumerate() {
                let cell = address + offset;
                if ch == '\'' {
                    let _ = writeln!(self.setup, "\tMM[{cell}].charVal = '\\'';");
                } else {
                    let _ = writeln!(self.setup, "\tMM[{cell}].charVal = '{ch}';");
                }
            }
            let nul = address + text.len();
            let _ = writeln!(self.setup, "\tMM[{nul}].charVal = '\\0';");
        }
        address
    }

    /// Assembles the final translation unit around the accumulated body.
    /// `main_locals` is the slot count of the top-level locals, subtracted
    /// from the stack pointer before control reaches `programbody`.
    pub fn finalize(self, main_locals: usize) -> String {
        let mut out = String::new();
        out.push_str("typedef union\n{\n");
        out.push_str("\tchar charVal;\n");
        out.push_str("\tint intVal;\n");
        out.push_str("\tfloat floatVal;\n");
        out.push_str("\tint stringPointer;\n");
        out.push_str("\tvoid* jumpTarget;\n");
        out.push_str("} MemoryFrame;\n\n");
        let _ = writeln!(out, "static MemoryFrame R[{REGISTER_SIZE}];");
        let _ = writeln!(out, "static MemoryFrame MM[{MEMORY_SIZE}];");
        out.push_str("static void* jumpRegister;\n\n");
        for proc in RuntimeProc::ALL {
            out.push_str(proc.forward_declaration());
            out.push('\n');
        }
        out.push_str("int printf( const char* format, ... );\n");
        out.push_str("void exit( int status );\n\n");
        out.push_str("int main( int argc, char** argv )\n{\n");
        let _ = writeln!(out, "\tR[0].intVal = {MEMORY_SIZE};");
        out.push_str("\tgoto programsetup;\n\n");

        out.push_str(&self.body);

        out.push_str("\nprogramsetup: ;\n");
        out.push_str(&self.setup);
        let _ = writeln!(out, "\tR[1].intVal = {};", self.memory_pointer);
        let _ = writeln!(out, "\tR[0].intVal = R[0].intVal - {main_locals};");
        out.push_str("\tgoto programbody;\n");

        for proc in RuntimeProc::ALL {
            if !self.runtime_used[proc as usize] {
                continue;
            }
            let _ = writeln!(out, "\n{}_start: ;", proc.name());
            let _ = writeln!(out, "\t{}", proc.bridge());
            out.push_str("\tjumpRegister = MM[ R[0].intVal + 1 ].jumpTarget;\n");
            out.push_str("\tgoto *jumpRegister;\n");
        }

        out.push_str("\nruntimeerror: ;\n");
        out.push_str(
            "\tprintf( \"Runtime Data Conversion Error: Converting Integer to Boolean\\n\" );\n",
        );
        out.push_str("\texit( 1 );\n");
        out.push_str("}\n\n#include \"runtime.c\"\n");
        out
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skeleton_pieces() {
        let mut emitter = Emitter::new();
        emitter.label(format_args!("programbody"));
        emitter.stmt(format_args!("return 0;"));
        let code = emitter.finalize(3);

        assert!(code.starts_with("typedef union"));
        assert!(code.contains("static MemoryFrame R[1024];"));
        assert!(code.contains("static MemoryFrame MM[65536];"));
        assert!(code.contains("\tR[0].intVal = 65536;\n\tgoto programsetup;"));
        assert!(code.contains("programbody: ;\n\treturn 0;"));
        assert!(code.contains("\tR[0].intVal = R[0].intVal - 3;\n\tgoto programbody;"));
        assert!(code.contains("runtimeerror: ;"));
        assert!(code.ends_with("#include \"runtime.c\"\n"));
    }

    #[test]
    fn string_storage_is_deferred_with_nul() {
        let mut emitter = Emitter::new();
        let base = emitter.store_string("hi");
        assert_eq!(base, 1);
        // next allocation starts past the terminator
        assert_eq!(emitter.alloc_memory(1), 4);
        let code = emitter.finalize(0);
        assert!(code.contains("\tMM[1].charVal = 'h';"));
        assert!(code.contains("\tMM[2].charVal = 'i';"));
        assert!(code.contains("\tMM[3].charVal = '\\0';"));
        assert!(code.contains("\tR[1].intVal = 5;"));
    }

    #[test]
    fn apostrophes_are_escaped() {
        let mut emitter = Emitter::new();
        emitter.store_string("it's");
        let code = emitter.finalize(0);
        assert!(code.contains("charVal = '\\'';"));
    }

    #[test]
    fn disabled_sink_drops_writes_but_keeps_cursors() {
        let mut emitter = Emitter::new();
        assert!(emitter.enabled());
        emitter.stmt(format_args!("R[2].intVal = 1;"));
        emitter.disable();
        assert!(!emitter.enabled());
        emitter.stmt(format_args!("R[3].intVal = 2;"));
        emitter.label(format_args!("if0_start"));
        assert_eq!(emitter.alloc_reg(), 2);
        assert_eq!(emitter.next_if_id(), 0);
        assert_eq!(emitter.next_if_id(), 1);
        let code = emitter.finalize(0);
        assert!(code.contains("R[2].intVal = 1;"));
        assert!(!code.contains("R[3].intVal = 2;"));
        assert!(!code.contains("if0_start"));
    }

    #[test]
    fn only_used_trampolines_appear() {
        let mut emitter = Emitter::new();
        emitter.mark_runtime(RuntimeProc::PutInteger);
        let code = emitter.finalize(0);
        assert!(code.contains("putInteger_start: ;\n\tputInteger( R[200].intVal );"));
        assert!(!code.contains("getBool_start:"));
        // forward declarations are unconditional
        assert!(code.contains("int getBool( void );"));
    }

    #[test]
    fn register_reset_returns_to_first_temporary() {
        let mut emitter = Emitter::new();
        assert_eq!(emitter.alloc_reg(), 2);
        assert_eq!(emitter.alloc_reg(), 3);
        emitter.reset_regs();
        assert_eq!(emitter.alloc_reg(), 2);
    }
}
