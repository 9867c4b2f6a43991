use nom::{
    bytes::complete::take,
    combinator::map,
    multi::count,
    number::complete::{be_u16, be_u32},
    IResult,
};

use crate::attribute_info::*;
use crate::error::ClassParserError;

pub fn attribute_parser(input: &[u8]) -> IResult<&[u8], AttributeInfo> {
    let (input, attribute_name_index) = be_u16(input)?;
    let (input, attribute_length) = be_u32(input)?;
    let (input, info) = take(attribute_length)(input)?;
    Ok((
        input,
        AttributeInfo {
            attribute_name_index,
            attribute_length,
            info: info.to_owned(),
        },
    ))
}

pub fn exception_entry_parser(input: &[u8]) -> IResult<&[u8], ExceptionEntry> {
    let (input, start_pc) = be_u16(input)?;
    let (input, end_pc) = be_u16(input)?;
    let (input, handler_pc) = be_u16(input)?;
    let (input, catch_type) = be_u16(input)?;
    Ok((
        input,
        ExceptionEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        },
    ))
}

pub fn code_attribute_parser(input: &[u8]) -> IResult<&[u8], CodeAttribute> {
    let (input, max_stack) = be_u16(input)?;
    let (input, max_locals) = be_u16(input)?;
    let (input, code_length) = be_u32(input)?;
    let (input, code) = take(code_length)(input)?;
    let (input, exception_table_length) = be_u16(input)?;
    let (input, exception_table) =
        count(exception_entry_parser, usize::from(exception_table_length))(input)?;
    let (input, attributes_count) = be_u16(input)?;
    let (input, attributes) = count(attribute_parser, usize::from(attributes_count))(input)?;
    Ok((
        input,
        CodeAttribute {
            max_stack,
            max_locals,
            code_length,
            code: code.to_owned(),
            exception_table_length,
            exception_table,
            attributes_count,
            attributes,
        },
    ))
}

pub fn exceptions_attribute_parser(input: &[u8]) -> IResult<&[u8], ExceptionsAttribute> {
    let (input, exception_table_length) = be_u16(input)?;
    let (input, exception_table) = count(be_u16, usize::from(exception_table_length))(input)?;
    Ok((
        input,
        ExceptionsAttribute {
            exception_table_length,
            exception_table,
        },
    ))
}

pub fn constant_value_attribute_parser(input: &[u8]) -> IResult<&[u8], ConstantValueAttribute> {
    map(be_u16, |constant_value_index| ConstantValueAttribute {
        constant_value_index,
    })(input)
}

pub fn sourcefile_attribute_parser(input: &[u8]) -> IResult<&[u8], SourceFileAttribute> {
    map(be_u16, |sourcefile_index| SourceFileAttribute { sourcefile_index })(input)
}

fn local_variable_table_item_parser(input: &[u8]) -> IResult<&[u8], LocalVariableTableItem> {
    let (input, start_pc) = be_u16(input)?;
    let (input, length) = be_u16(input)?;
    let (input, name_index) = be_u16(input)?;
    let (input, descriptor_index) = be_u16(input)?;
    let (input, index) = be_u16(input)?;
    Ok((
        input,
        LocalVariableTableItem {
            start_pc,
            length,
            name_index,
            descriptor_index,
            index,
        },
    ))
}

pub fn local_variable_table_attribute_parser(
    input: &[u8],
) -> IResult<&[u8], LocalVariableTableAttribute> {
    let (input, local_variable_table_length) = be_u16(input)?;
    let (input, items) = count(
        local_variable_table_item_parser,
        usize::from(local_variable_table_length),
    )(input)?;
    Ok((
        input,
        LocalVariableTableAttribute {
            local_variable_table_length,
            items,
        },
    ))
}

/// Runs an attribute-body parser over the raw `info` bytes of an attribute.
pub fn interpret<T>(
    info: &[u8],
    attribute: &'static str,
    parser: fn(&[u8]) -> IResult<&[u8], T>,
) -> Result<T, ClassParserError> {
    match parser(info) {
        Ok((_, parsed)) => Ok(parsed),
        Err(_) => Err(ClassParserError::Attribute { attribute }),
    }
}
