#![warn(missing_docs)]
//! Module for uom macros that facilitate the creation of single length values or vectors of lengths
/// helper macro to create the units
#[macro_export]
macro_rules! uom_unit_creator {
    ($unit:ident, $unit_type:ident, $val1:expr) => {
        $unit_type::new::<$unit>($val1)
    };
    ($unit:ident, $unit_type:ident, $( $x:expr ),*) => {
        {
            use std::vec::Vec;
            let mut temp_vec = Vec::new();
            $(
                temp_vec.push($unit_type::new::<$unit>($x));
            )*
            temp_vec
        }
    };
}

///macro to create a Length in meter
#[macro_export]
macro_rules! meter {
    ($( $x:expr ),*) =>{
        {
            use uom::si::{f64::Length, length::meter};
            $crate::uom_unit_creator![meter, Length, $( $x ),*]
        }
    };
}
///macro to create a Length in centimeter
#[macro_export]
macro_rules! centimeter {
    ($( $x:expr ),*) =>{{
        use uom::si::{f64::Length, length::centimeter};
        $crate::uom_unit_creator![centimeter, Length, $( $x ),*]
    }};
}
///macro to create a Length in millimeter
#[macro_export]
macro_rules! millimeter {
    ($( $x:expr ),*) =>{{
        use uom::si::{f64::Length, length::millimeter};
        $crate::uom_unit_creator![millimeter, Length, $( $x ),*]
    }};
}
///macro to create a Length in micrometer
#[macro_export]
macro_rules! micrometer {
    ($( $x:expr ),*) =>{{
        use uom::si::{f64::Length, length::micrometer};
        $crate::uom_unit_creator![micrometer, Length, $( $x ),*]
    }};
}
///macro to create a Length in nanometer
#[macro_export]
macro_rules! nanometer {
    ($( $x:expr ),*) =>{{
        use uom::si::{f64::Length, length::nanometer};
        $crate::uom_unit_creator![nanometer, Length, $( $x ),*]
    }};
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use uom::si::{f64::Length, length::meter as m};
    #[test]
    fn single_values() {
        assert_eq!(meter!(1.0), Length::new::<m>(1.0));
        assert_relative_eq!(centimeter!(1.0).get::<m>(), 1.0e-2);
        assert_relative_eq!(millimeter!(1.0).get::<m>(), 1.0e-3);
        assert_relative_eq!(micrometer!(1.0).get::<m>(), 1.0e-6);
        assert_relative_eq!(nanometer!(1.0).get::<m>(), 1.0e-9);
    }
    #[test]
    fn vectors() {
        let v = millimeter!(1.0, 2.0, 3.0);
        assert_eq!(v.len(), 3);
        assert_relative_eq!(v[2].get::<m>(), 3.0e-3);
    }
}
