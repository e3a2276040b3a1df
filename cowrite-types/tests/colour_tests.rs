use cowrite_types::Colour;

#[test]
fn wire_round_trip() {
    let c = Colour::new(0xff, 0x88, 0x00);
    assert_eq!(c.to_wire(), "ff8800");
    assert_eq!(Colour::from_wire("ff8800").unwrap(), c);
}

#[test]
fn parse_accepts_leading_hash() {
    let c: Colour = "#00ff00".parse().unwrap();
    assert_eq!(c, Colour::new(0, 255, 0));
}

#[test]
fn parse_rejects_malformed() {
    assert!(Colour::from_wire("fff").is_err());
    assert!(Colour::from_wire("gggggg").is_err());
    assert!(Colour::from_wire("ff88000").is_err());
}

#[test]
fn identical_colours_are_similar() {
    let c = Colour::new(10, 20, 30);
    assert!(c.similar_to(&c));
}

#[test]
fn nearby_colours_are_similar() {
    let a = Colour::new(100, 100, 100);
    let b = Colour::new(110, 95, 105);
    assert!(a.similar_to(&b));
    assert!(b.similar_to(&a));
}

#[test]
fn distant_colours_are_not_similar() {
    let a = Colour::new(0, 0, 0);
    let b = Colour::new(255, 255, 255);
    assert!(!a.similar_to(&b));
}
