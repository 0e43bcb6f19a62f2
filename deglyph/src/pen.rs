//! Recording of glyph outlines as an ordered command program.

use core::fmt;

use skrifa::outline::OutlinePen;

/// A point in font design units.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    /// Rust's float formatting is the shortest representation that round
    /// trips, independent of platform. The only remaining ambiguity is the
    /// sign of zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let x = if self.x == 0.0 { 0.0 } else { self.x };
        let y = if self.y == 0.0 { 0.0 } else { self.y };
        write!(f, "{x} {y}")
    }
}

/// Single drawing instruction of an outline program.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Command {
    /// Begin a new subpath at the given point.
    MoveTo(Point),
    /// Line from the current point.
    LineTo(Point),
    /// Quadratic bezier: control point, end point.
    QuadTo(Point, Point),
    /// Cubic bezier: two control points, end point.
    CurveTo(Point, Point, Point),
    /// Close the current subpath.
    Close,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveTo(p) => write!(f, "M {p};"),
            Self::LineTo(p) => write!(f, "L {p};"),
            Self::QuadTo(c, p) => write!(f, "Q {c} {p};"),
            Self::CurveTo(c0, c1, p) => write!(f, "C {c0} {c1} {p};"),
            Self::Close => write!(f, "Z;"),
        }
    }
}

/// The ordered drawing commands emitted for one glyph.
///
/// This is the pen handed to the outline loader. Commands are stored exactly
/// as emitted: no transformation, no removal of degenerate segments. The
/// [`Display`](fmt::Display) impl produces the canonical serialization that
/// glyph fingerprints are computed over.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct OutlineProgram {
    commands: Vec<Command>,
}

impl OutlineProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Removes all commands, keeping the allocation for the next glyph.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl From<Vec<Command>> for OutlineProgram {
    fn from(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

impl OutlinePen for OutlineProgram {
    fn move_to(&mut self, x: f32, y: f32) {
        self.commands.push(Command::MoveTo(Point::new(x, y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.commands.push(Command::LineTo(Point::new(x, y)));
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.commands
            .push(Command::QuadTo(Point::new(cx0, cy0), Point::new(x, y)));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.commands.push(Command::CurveTo(
            Point::new(cx0, cy0),
            Point::new(cx1, cy1),
            Point::new(x, y),
        ));
    }

    fn close(&mut self) {
        self.commands.push(Command::Close);
    }
}

impl fmt::Display for OutlineProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for command in &self.commands {
            write!(f, "{command}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_emission_order() {
        let mut program = OutlineProgram::new();
        program.move_to(1.0, 2.0);
        program.line_to(42.0, 24.0);
        program.quad_to(3.0, 4.0, 5.0, 6.0);
        program.curve_to(7.0, 8.0, 9.0, 10.0, 11.0, 12.0);
        program.close();
        assert_eq!(
            program.commands(),
            &[
                Command::MoveTo(Point::new(1.0, 2.0)),
                Command::LineTo(Point::new(42.0, 24.0)),
                Command::QuadTo(Point::new(3.0, 4.0), Point::new(5.0, 6.0)),
                Command::CurveTo(
                    Point::new(7.0, 8.0),
                    Point::new(9.0, 10.0),
                    Point::new(11.0, 12.0)
                ),
                Command::Close,
            ]
        );
    }

    #[test]
    fn canonical_text() {
        let mut program = OutlineProgram::new();
        program.move_to(0.5, -0.0);
        program.line_to(100.0, 2.25);
        program.quad_to(-3.0, 4.0, 5.0, 6.0);
        program.curve_to(7.0, 8.0, 9.0, 10.0, 11.0, 12.0);
        program.close();
        assert_eq!(
            program.to_string(),
            "M 0.5 0;L 100 2.25;Q -3 4 5 6;C 7 8 9 10 11 12;Z;"
        );
    }

    #[test]
    fn clear_reuses_program() {
        let mut program = OutlineProgram::new();
        program.move_to(1.0, 1.0);
        program.close();
        assert!(!program.is_empty());
        program.clear();
        assert!(program.is_empty());
        assert_eq!(program.to_string(), "");
    }
}
