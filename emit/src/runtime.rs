/// The eight I/O procedures fulfilled by the external C runtime.
///
/// Each one is reached through the ordinary call protocol; the emitted
/// trampoline bridges from the staging register to a plain C call and jumps
/// back through the pushed return address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuntimeProc {
    GetBool,
    GetInteger,
    GetFloat,
    GetString,
    PutBool,
    PutInteger,
    PutFloat,
    PutString,
}

impl RuntimeProc {
    pub const ALL: [RuntimeProc; 8] = [
        Self::GetBool,
        Self::GetInteger,
        Self::GetFloat,
        Self::GetString,
        Self::PutBool,
        Self::PutInteger,
        Self::PutFloat,
        Self::PutString,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "getBool" => Some(Self::GetBool),
            "getInteger" => Some(Self::GetInteger),
            "getFloat" => Some(Self::GetFloat),
            "getString" => Some(Self::GetString),
            "putBool" => Some(Self::PutBool),
            "putInteger" => Some(Self::PutInteger),
            "putFloat" => Some(Self::PutFloat),
            "putString" => Some(Self::PutString),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::GetBool => "getBool",
            Self::GetInteger => "getInteger",
            Self::GetFloat => "getFloat",
            Self::GetString => "getString",
            Self::PutBool => "putBool",
            Self::PutInteger => "putInteger",
            Self::PutFloat => "putFloat",
            Self::PutString => "putString",
        }
    }

    pub const fn forward_declaration(self) -> &'static str {
        match self {
            Self::GetBool => "int getBool( void );",
            Self::GetInteger => "int getInteger( void );",
            Self::GetFloat => "float getFloat( void );",
            Self::GetString => "int getString( void );",
            Self::PutBool => "int putBool( int oldBool );",
            Self::PutInteger => "int putInteger( int oldInteger );",
            Self::PutFloat => "int putFloat( float oldFloat );",
            Self::PutString => "int putString( int oldString );",
        }
    }

    /// The transfer between `R[200]` and the C function.
    pub(crate) const fn bridge(self) -> &'static str {
        match self {
            Self::GetBool => "R[200].intVal = getBool();",
            Self::GetInteger => "R[200].intVal = getInteger();",
            Self::GetFloat => "R[200].floatVal = getFloat();",
            Self::GetString => "R[200].stringPointer = getString();",
            Self::PutBool => "putBool( R[200].intVal );",
            Self::PutInteger => "putInteger( R[200].intVal );",
            Self::PutFloat => "putFloat( R[200].floatVal );",
            Self::PutString => "putString( R[200].stringPointer );",
        }
    }
}
