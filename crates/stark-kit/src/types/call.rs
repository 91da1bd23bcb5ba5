//! Multicall calldata encoding.
//!
//! An account contract exposes a single `__execute__` entry point that takes
//! every call at once. The calldata layout is:
//!
//! ```text
//! [n_calls,
//!  to_0, selector_0, data_offset_0, data_len_0,
//!  ...
//!  to_n, selector_n, data_offset_n, data_len_n,
//!  n_args, args_0..., args_1..., ...]
//! ```
//!
//! Offsets index into the shared argument buffer, which is concatenated in
//! call order; the two must stay in lock-step.

use starknet_core::types::Felt;
use starknet_core::utils::get_selector_from_name;

use crate::error::CallError;

/// A single contract call routed through an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// Target contract address.
    pub to: Felt,
    /// Entry point name, hashed into a selector at encoding time.
    pub selector: String,
    /// Arguments.
    pub calldata: Vec<Felt>,
}

impl Call {
    /// Create a call.
    pub fn new(to: Felt, selector: impl Into<String>, calldata: Vec<Felt>) -> Self {
        Self {
            to,
            selector: selector.into(),
            calldata,
        }
    }

    /// Parse a list of untyped `[target, "selector", [args...]]` triples.
    pub fn parse_many(value: &serde_json::Value) -> Result<Vec<Call>, CallError> {
        let calls = value.as_array().ok_or_else(|| {
            CallError::MalformedCalldata("expected an array of calls".to_string())
        })?;
        calls
            .iter()
            .enumerate()
            .map(|(index, call)| Call::from_json(index, call))
            .collect()
    }

    fn from_json(index: usize, value: &serde_json::Value) -> Result<Call, CallError> {
        let parts = match value.as_array() {
            Some(parts) if parts.len() == 3 => parts,
            Some(parts) => {
                return Err(CallError::InvalidCallArity {
                    index,
                    len: parts.len(),
                });
            }
            None => {
                return Err(CallError::MalformedCalldata(format!(
                    "call #{} must be a [target, selector, arguments] array, got {}",
                    index, value
                )));
            }
        };

        let to = json_felt(index, &parts[0])?;
        let selector = parts[1]
            .as_str()
            .ok_or_else(|| CallError::InvalidSelector(parts[1].to_string()))?
            .to_string();
        let calldata = match &parts[2] {
            serde_json::Value::Array(args) => args
                .iter()
                .map(|arg| json_felt(index, arg))
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![json_felt(index, other)?],
        };

        Ok(Call {
            to,
            selector,
            calldata,
        })
    }
}

impl TryFrom<&serde_json::Value> for Call {
    type Error = CallError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Call::from_json(0, value)
    }
}

fn json_felt(index: usize, value: &serde_json::Value) -> Result<Felt, CallError> {
    let invalid = || CallError::InvalidFelt {
        index,
        value: value.to_string(),
    };
    match value {
        serde_json::Value::String(s) => s.parse::<Felt>().map_err(|_| invalid()),
        serde_json::Value::Number(n) => n.as_u64().map(Felt::from).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Per-call entry of the call array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallDescriptor {
    pub to: Felt,
    pub selector: Felt,
    pub data_offset: usize,
    pub data_len: usize,
}

/// A call recovered from encoded multicall calldata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedCall {
    pub to: Felt,
    pub selector: Felt,
    pub calldata: Vec<Felt>,
}

/// Split calls into descriptors and the shared argument buffer.
pub fn to_call_array(calls: &[Call]) -> Result<(Vec<CallDescriptor>, Vec<Felt>), CallError> {
    let mut descriptors = Vec::with_capacity(calls.len());
    let mut buffer = Vec::new();

    for call in calls {
        let selector = get_selector_from_name(&call.selector)
            .map_err(|_| CallError::InvalidSelector(call.selector.clone()))?;
        descriptors.push(CallDescriptor {
            to: call.to,
            selector,
            data_offset: buffer.len(),
            data_len: call.calldata.len(),
        });
        buffer.extend_from_slice(&call.calldata);
    }

    Ok((descriptors, buffer))
}

/// Encode calls into the flat calldata an account's `__execute__` expects.
pub fn encode_multicall(calls: &[Call]) -> Result<Vec<Felt>, CallError> {
    let (descriptors, buffer) = to_call_array(calls)?;

    let mut calldata = Vec::with_capacity(2 + descriptors.len() * 4 + buffer.len());
    calldata.push(Felt::from(descriptors.len()));
    for d in &descriptors {
        calldata.extend([
            d.to,
            d.selector,
            Felt::from(d.data_offset),
            Felt::from(d.data_len),
        ]);
    }
    calldata.push(Felt::from(buffer.len()));
    calldata.extend(buffer);

    Ok(calldata)
}

/// Decode calldata produced by [`encode_multicall`].
pub fn decode_multicall(calldata: &[Felt]) -> Result<Vec<DecodedCall>, CallError> {
    let malformed = |msg: &str| CallError::MalformedCalldata(msg.to_string());

    let (n_calls, rest) = calldata
        .split_first()
        .ok_or_else(|| malformed("empty calldata"))?;
    let n_calls = felt_to_usize(n_calls).ok_or_else(|| malformed("call count overflows"))?;

    let descriptors_len = n_calls
        .checked_mul(4)
        .ok_or_else(|| malformed("call count overflows"))?;
    if rest.len() < descriptors_len + 1 {
        return Err(malformed("truncated call array"));
    }
    let (descriptors, rest) = rest.split_at(descriptors_len);
    let (n_args, buffer) = rest
        .split_first()
        .ok_or_else(|| malformed("missing argument count"))?;
    if felt_to_usize(n_args) != Some(buffer.len()) {
        return Err(malformed("argument count does not match buffer length"));
    }

    descriptors
        .chunks_exact(4)
        .map(|d| {
            let offset = felt_to_usize(&d[2]).ok_or_else(|| malformed("offset overflows"))?;
            let len = felt_to_usize(&d[3]).ok_or_else(|| malformed("length overflows"))?;
            let slice = offset
                .checked_add(len)
                .and_then(|end| buffer.get(offset..end))
                .ok_or_else(|| malformed("argument slice out of bounds"))?;
            Ok(DecodedCall {
                to: d[0],
                selector: d[1],
                calldata: slice.to_vec(),
            })
        })
        .collect()
}

fn felt_to_usize(felt: &Felt) -> Option<usize> {
    u64::try_from(*felt)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
}
