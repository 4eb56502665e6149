//! Name operation prefixes on locking scripts.
//!
//! A name output carries one of three operations pushed in front of an
//! ordinary locking script and dropped before it executes:
//!
//! - NAME_NEW: `OP_1 <hash> OP_2DROP`
//! - NAME_FIRSTUPDATE: `OP_2 <name> <rand> <value> OP_2DROP OP_2DROP`
//! - NAME_UPDATE: `OP_3 <name> <value> OP_2DROP OP_DROP`

pub const OP_NAME_NEW: u8 = 0x51;
pub const OP_NAME_FIRSTUPDATE: u8 = 0x52;
pub const OP_NAME_UPDATE: u8 = 0x53;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_DROP: u8 = 0x75;
const OP_2DROP: u8 = 0x6d;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NameOp {
    New {
        hash: Vec<u8>,
    },
    FirstUpdate {
        name: Vec<u8>,
        rand: Vec<u8>,
        value: Vec<u8>,
    },
    Update {
        name: Vec<u8>,
        value: Vec<u8>,
    },
}

/// A script pubkey split into its optional name prefix and the address
/// script behind it. Scripts without a well-formed prefix parse as a plain
/// address script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NameScript {
    pub op: Option<NameOp>,
    pub address: Vec<u8>,
}

impl NameScript {
    pub fn parse(script: &[u8]) -> Self {
        match try_parse(script) {
            Some((op, address)) => Self {
                op: Some(op),
                address: address.to_vec(),
            },
            None => Self {
                op: None,
                address: script.to_vec(),
            },
        }
    }

    pub fn is_name_op(&self) -> bool {
        self.op.is_some()
    }

    /// Whether this operation binds a name to data (NAME_NEW only commits
    /// to a hash and carries no name).
    pub fn is_any_update(&self) -> bool {
        matches!(
            self.op,
            Some(NameOp::FirstUpdate { .. }) | Some(NameOp::Update { .. })
        )
    }

    pub fn op_name(&self) -> Option<&[u8]> {
        match &self.op {
            Some(NameOp::FirstUpdate { name, .. }) | Some(NameOp::Update { name, .. }) => {
                Some(name.as_slice())
            }
            _ => None,
        }
    }

    pub fn op_value(&self) -> Option<&[u8]> {
        match &self.op {
            Some(NameOp::FirstUpdate { value, .. }) | Some(NameOp::Update { value, .. }) => {
                Some(value.as_slice())
            }
            _ => None,
        }
    }
}

fn try_parse(script: &[u8]) -> Option<(NameOp, &[u8])> {
    let (&opcode, rest) = script.split_first()?;
    match opcode {
        OP_NAME_NEW => {
            let (hash, rest) = read_push(rest)?;
            let rest = expect_opcode(rest, OP_2DROP)?;
            Some((NameOp::New { hash }, rest))
        }
        OP_NAME_FIRSTUPDATE => {
            let (name, rest) = read_push(rest)?;
            let (rand, rest) = read_push(rest)?;
            let (value, rest) = read_push(rest)?;
            let rest = expect_opcode(rest, OP_2DROP)?;
            let rest = expect_opcode(rest, OP_2DROP)?;
            Some((NameOp::FirstUpdate { name, rand, value }, rest))
        }
        OP_NAME_UPDATE => {
            let (name, rest) = read_push(rest)?;
            let (value, rest) = read_push(rest)?;
            let rest = expect_opcode(rest, OP_2DROP)?;
            let rest = expect_opcode(rest, OP_DROP)?;
            Some((NameOp::Update { name, value }, rest))
        }
        _ => None,
    }
}

fn expect_opcode(script: &[u8], opcode: u8) -> Option<&[u8]> {
    match script.split_first() {
        Some((&first, rest)) if first == opcode => Some(rest),
        _ => None,
    }
}

fn read_push(script: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    let (&opcode, rest) = script.split_first()?;
    let (len, rest) = match opcode {
        1..=0x4b => (opcode as usize, rest),
        OP_PUSHDATA1 => {
            let (&len, rest) = rest.split_first()?;
            (len as usize, rest)
        }
        OP_PUSHDATA2 => {
            if rest.len() < 2 {
                return None;
            }
            let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
            (len, &rest[2..])
        }
        OP_PUSHDATA4 => {
            if rest.len() < 4 {
                return None;
            }
            let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            (len, &rest[4..])
        }
        _ => return None,
    };
    if rest.len() < len {
        return None;
    }
    Some((rest[..len].to_vec(), &rest[len..]))
}

fn push_data(out: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0..=0x4b => out.push(data.len() as u8),
        0x4c..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(data.len() as u8);
        }
        _ => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}

pub fn name_new_script(hash: &[u8], address: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_NAME_NEW];
    push_data(&mut script, hash);
    script.push(OP_2DROP);
    script.extend_from_slice(address);
    script
}

pub fn name_firstupdate_script(name: &[u8], rand: &[u8], value: &[u8], address: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_NAME_FIRSTUPDATE];
    push_data(&mut script, name);
    push_data(&mut script, rand);
    push_data(&mut script, value);
    script.push(OP_2DROP);
    script.push(OP_2DROP);
    script.extend_from_slice(address);
    script
}

pub fn name_update_script(name: &[u8], value: &[u8], address: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_NAME_UPDATE];
    push_data(&mut script, name);
    push_data(&mut script, value);
    script.push(OP_2DROP);
    script.push(OP_DROP);
    script.extend_from_slice(address);
    script
}
