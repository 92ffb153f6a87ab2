use proptest::prelude::*;
use xlnames_parse::{
    CellRef, MAX_COLS, MAX_ROWS, Reference, TokenSubType, TokenType, Tokenizer, parse,
};

fn arb_formula() -> impl Strategy<Value = String> {
    let alphabet = prop::sample::select(vec![
        '=', '(', ')', '{', '}', '[', ']', '!', '#', '+', '-', '*', '/', '^', '&', '<', '>', ',',
        ';', '.', ':', '$', '%', 'A', 'B', 'E', 'R', 'S', '1', '2', '9', '\'', '"', ' ', '\n',
    ]);
    prop::collection::vec(alphabet, 0..40).prop_map(|cs| cs.into_iter().collect())
}

fn arb_sheet() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec![
        "Sheet1".to_string(),
        "My Sheet".to_string(),
        "Bob's".to_string(),
        "2024".to_string(),
        "Data.Q1".to_string(),
        "A1".to_string(),
    ]))
}

fn arb_cell() -> impl Strategy<Value = CellRef> {
    (1..=MAX_ROWS, 1..=MAX_COLS, any::<bool>(), any::<bool>()).prop_map(
        |(row, col, row_abs, col_abs)| CellRef {
            row,
            col,
            row_abs,
            col_abs,
        },
    )
}

fn arb_reference() -> impl Strategy<Value = Reference> {
    prop_oneof![
        (arb_sheet(), arb_cell()).prop_map(|(sheet, cell)| Reference::Cell { sheet, cell }),
        (arb_sheet(), arb_cell(), arb_cell()).prop_map(|(s, a, b)| Reference::range(s, a, b)),
        (arb_sheet(), 1..=MAX_ROWS, 1..=MAX_ROWS, any::<bool>()).prop_map(|(sheet, a, b, abs)| {
            Reference::Rows {
                sheet,
                first: a.min(b),
                last: a.max(b),
                first_abs: abs,
                last_abs: !abs,
            }
        }),
        (arb_sheet(), 1..=MAX_COLS, 1..=MAX_COLS).prop_map(|(sheet, a, b)| Reference::Columns {
            sheet,
            first: a.min(b),
            last: a.max(b),
            first_abs: true,
            last_abs: true,
        }),
        arb_sheet().prop_map(|sheet| Reference::Error { sheet }),
    ]
}

proptest! {
    #[test]
    fn tokens_cover_the_input_exactly(formula in arb_formula()) {
        if let Ok(tok) = Tokenizer::new(&formula) {
            prop_assert_eq!(tok.render(), formula.clone());
            let mut cursor = usize::from(formula.starts_with('='));
            for t in &tok.items {
                prop_assert_eq!(t.start, cursor);
                prop_assert_eq!(&formula[t.start..t.end], t.value.as_str());
                cursor = t.end;
            }
            prop_assert_eq!(cursor, formula.len());
        }
    }

    #[test]
    fn parser_never_panics(formula in arb_formula()) {
        let _ = parse(&formula);
    }

    #[test]
    fn serialized_references_tokenize_to_one_reference(r in arb_reference()) {
        let text = r.to_string();
        let tok = Tokenizer::new(&text).unwrap();
        prop_assert_eq!(tok.items.len(), 1);
        prop_assert_eq!(tok.items[0].token_type, TokenType::Operand);
        prop_assert_eq!(tok.items[0].subtype, TokenSubType::Range);
        prop_assert_eq!(Reference::parse(&text).unwrap(), r);
    }
}
