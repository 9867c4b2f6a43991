pub mod opcodes;
mod types;

pub use self::types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fixed_lengths() {
        // iload_1, bipush 10, if_icmpge +7, iinc 1 1, goto -8, return
        let code = [0x1b, 0x10, 0x0a, 0xa2, 0x00, 0x07, 0x84, 0x01, 0x01, 0xa7, 0xff, 0xf8, 0xb1];
        let list = normalize(&code).unwrap();
        let offsets: Vec<usize> = list.iter().map(|i| i.index).collect();
        assert_eq!(offsets, vec![0, 1, 3, 6, 9, 12]);
        assert_eq!(list[2].target_pc(), Some(10));
        assert_eq!(list[4].target_pc(), Some(1));
        assert_eq!(list[3].local_slot(), Some(1));
        assert!(list[5].is_return());
    }

    #[test]
    fn test_normalize_wide_prefix() {
        // wide iload 0x0100, wide iinc 0x0100 -2, return
        let code = [0xc4, 0x15, 0x01, 0x00, 0xc4, 0x84, 0x01, 0x00, 0xff, 0xfe, 0xb1];
        let list = normalize(&code).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list[0].wide);
        assert_eq!(list[0].opcode, 0x15);
        assert_eq!(list[0].local_slot(), Some(256));
        assert_eq!(list[1].length, 6);
        assert_eq!(list[1].i16_at(2).unwrap(), -2);
        assert_eq!(list[2].index, 10);
    }

    #[test]
    fn test_tableswitch_alignment() {
        // nop, iload_0, tableswitch at pc 2: one padding byte to reach offset 4
        let mut code = vec![0x00, 0x1a, 0xaa, 0x00];
        code.extend_from_slice(&30i32.to_be_bytes()); // default
        code.extend_from_slice(&1i32.to_be_bytes()); // low
        code.extend_from_slice(&2i32.to_be_bytes()); // high
        code.extend_from_slice(&26i32.to_be_bytes());
        code.extend_from_slice(&28i32.to_be_bytes());
        code.push(0xb1);
        let list = normalize(&code).unwrap();
        assert_eq!(list[2].length, 1 + 1 + 12 + 8);
        assert_eq!(list[3].index, 24);
        let table = list[2].switch_table().unwrap();
        assert_eq!(table.default, 32);
        assert_eq!(table.cases, vec![(1, 28), (2, 30)]);
        assert_eq!(table.targets(), vec![28, 30, 32]);
    }

    #[test]
    fn test_lookupswitch() {
        // lookupswitch at pc 0: three padding bytes
        let mut code = vec![0xab, 0, 0, 0];
        code.extend_from_slice(&20i32.to_be_bytes()); // default
        code.extend_from_slice(&1i32.to_be_bytes()); // npairs
        code.extend_from_slice(&(-5i32).to_be_bytes());
        code.extend_from_slice(&20i32.to_be_bytes());
        code.push(0xb1);
        let list = normalize(&code).unwrap();
        assert_eq!(list[0].length, 20);
        let table = list[0].switch_table().unwrap();
        assert_eq!(table.cases, vec![(-5, 20)]);
    }

    #[test]
    fn test_truncated_operand_is_clamped() {
        let list = normalize(&[0x00, 0x11, 0x01]).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].length, 2);
        assert!(list[1].i16_at(0).is_err());
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(normalize(&[0xfe]).is_err());
        assert!(normalize(&[]).unwrap().is_empty());
    }
}
